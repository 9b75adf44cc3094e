use serde::{Deserialize, Serialize};

/// Which captured CPU metric drives the performance-based sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerfBasis {
    P95,
    Peak,
    Average,
}

impl PerfBasis {
    pub fn label(&self) -> &'static str {
        match self {
            PerfBasis::P95 => "95th Percentile",
            PerfBasis::Peak => "Peak CPU",
            PerfBasis::Average => "Average CPU",
        }
    }
}

/// User-tunable sizing knobs. Every field has a default so a bare
/// `{}` request body sizes with the standard assumptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingParameters {
    pub sockets_per_host: u32,
    pub cores_per_socket: u32,
    pub ram_per_host_gb: f64,
    pub cpu_clock_ghz: f64,
    pub perf_basis: PerfBasis,
    pub max_vcpu_ratio: f64,
    pub cpu_buffer_pct: f64,
    pub ram_buffer_pct: f64,
    pub min_cluster_size: u32,
    pub ha_nodes: u32,
    pub include_powered_off: bool,
    pub annual_growth_pct: f64,
    pub projection_years: u32,
    /// `None` analyzes every cluster in the file; a list narrows the scope.
    pub clusters: Option<Vec<String>>,
}

impl Default for SizingParameters {
    fn default() -> Self {
        Self {
            sockets_per_host: 2,
            cores_per_socket: 24,
            ram_per_host_gb: 1024.0,
            cpu_clock_ghz: 2.5,
            perf_basis: PerfBasis::P95,
            max_vcpu_ratio: 5.0,
            cpu_buffer_pct: 10.0,
            ram_buffer_pct: 10.0,
            min_cluster_size: 3,
            ha_nodes: 1,
            include_powered_off: true,
            annual_growth_pct: 10.0,
            projection_years: 3,
            clusters: None,
        }
    }
}

impl SizingParameters {
    pub fn cores_per_host(&self) -> f64 {
        (self.sockets_per_host * self.cores_per_socket) as f64
    }

    /// Target NUMA node width in cores.
    pub fn target_numa_cores(&self) -> f64 {
        self.cores_per_socket as f64
    }

    /// Target NUMA node memory in GB.
    pub fn target_numa_ram_gb(&self) -> f64 {
        if self.sockets_per_host > 0 {
            self.ram_per_host_gb / self.sockets_per_host as f64
        } else {
            0.0
        }
    }
}

/// Cluster scope selection derived from `SizingParameters::clusters`.
#[derive(Debug, Clone)]
pub enum ClusterScope {
    All,
    Subset(Vec<String>),
}

impl ClusterScope {
    pub fn from_selection(selection: &Option<Vec<String>>) -> Self {
        match selection {
            Some(names) if !names.is_empty() => ClusterScope::Subset(names.clone()),
            _ => ClusterScope::All,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, ClusterScope::All)
    }

    pub fn includes(&self, cluster: &str) -> bool {
        match self {
            ClusterScope::All => true,
            ClusterScope::Subset(names) => names.iter().any(|n| n == cluster),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ClusterScope::All => "All Clusters".to_string(),
            ClusterScope::Subset(names) => names.join(", "),
        }
    }
}

/// Largest single VM seen on each axis; ties keep the first row scanned.
#[derive(Debug, Clone, Serialize)]
pub struct VmOutliers {
    pub max_vcpu: f64,
    pub max_vcpu_name: String,
    pub max_ram_gb: f64,
    pub max_ram_name: String,
}

impl Default for VmOutliers {
    fn default() -> Self {
        Self {
            max_vcpu: 0.0,
            max_vcpu_name: "N/A".to_string(),
            max_ram_gb: 0.0,
            max_ram_name: "N/A".to_string(),
        }
    }
}

/// Infrastructure storage totals with a note on where they came from.
#[derive(Debug, Clone, Serialize)]
pub struct StorageFacts {
    pub capacity_tb: f64,
    pub used_tb: f64,
    pub free_tb: f64,
    pub provisioned_tb: f64,
    pub provenance: String,
}

impl Default for StorageFacts {
    fn default() -> Self {
        Self {
            capacity_tb: 0.0,
            used_tb: 0.0,
            free_tb: 0.0,
            provisioned_tb: 0.0,
            provenance: "Not available in source file".to_string(),
        }
    }
}

/// Canonical fact set both source formats map onto. Absent source data
/// lands as zero / "Unknown" / false so downstream consumers never see a
/// missing field.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalFacts {
    pub vm_count: usize,
    pub total_vcpu: f64,
    pub total_vram_gb: f64,
    pub provisioned_tb: f64,
    pub used_tb: f64,
    pub guest_used_tb: f64,
    pub rdm_count: usize,
    pub rdm_tb: f64,
    pub outliers: VmOutliers,
    pub host_count: usize,
    pub total_pcores: f64,
    pub total_pram_gb: f64,
    pub numa_cores_est: f64,
    pub numa_ram_gb_est: f64,
    pub license_cores: f64,
    pub license_edition: String,
    pub storage: StorageFacts,
    pub has_perf: bool,
    pub perf_demand_ghz: f64,
    /// Heuristic: no local-disk / RAID-controller naming anywhere in the
    /// device data. A weak signal that a vSAN-style layer is in use, nothing
    /// stronger.
    pub no_local_disk_signatures: bool,
}

impl Default for CanonicalFacts {
    fn default() -> Self {
        Self {
            vm_count: 0,
            total_vcpu: 0.0,
            total_vram_gb: 0.0,
            provisioned_tb: 0.0,
            used_tb: 0.0,
            guest_used_tb: 0.0,
            rdm_count: 0,
            rdm_tb: 0.0,
            outliers: VmOutliers::default(),
            host_count: 0,
            total_pcores: 0.0,
            total_pram_gb: 0.0,
            numa_cores_est: 0.0,
            numa_ram_gb_est: 0.0,
            license_cores: 0.0,
            license_edition: "Unknown".to_string(),
            storage: StorageFacts::default(),
            has_perf: false,
            perf_demand_ghz: 0.0,
            no_local_disk_signatures: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindingConstraint {
    #[serde(rename = "CPU")]
    Cpu,
    #[serde(rename = "RAM")]
    Ram,
}

impl BindingConstraint {
    pub fn label(&self) -> &'static str {
        match self {
            BindingConstraint::Cpu => "CPU",
            BindingConstraint::Ram => "RAM",
        }
    }
}

/// Sizing decision. Recomputed from scratch on every request; nothing here
/// is cached or incremental.
#[derive(Debug, Clone, Serialize)]
pub struct SizingResult {
    pub hosts_now: u32,
    pub hosts_future: u32,
    pub binding_constraint: BindingConstraint,
    pub hosts_for_cpu: u32,
    pub hosts_for_ram: u32,
    pub future_hosts_for_cpu: u32,
    pub future_hosts_for_ram: u32,
    pub raw_hosts: u32,
    pub future_vcpu: f64,
    pub future_vram_gb: f64,
    pub effective_cores_per_host: f64,
    pub effective_ram_per_host_gb: f64,
    pub current_ratio: f64,
    pub sized_ratio: f64,
    pub failover_ratio: f64,
    pub future_ratio: f64,
    pub license_cores_now: f64,
    pub license_cores_future: f64,
    pub license_core_delta: f64,
    /// Zero unless the source carried performance data.
    pub perf_hosts: u32,
}
