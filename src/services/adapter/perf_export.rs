//! Performance-export-style (Live Optics) adapter.
//!
//! Sheet layout: `VMs` for demand, `ESX Hosts` for supply, `Host Devices`
//! for LUN capacity, `ESX Performance` for captured CPU consumption and
//! `ESX Licenses` for the edition label. These exports stack project
//! banner rows above the real headers, so header promotion matters here.

use calamine::Data;

use crate::models::{CanonicalFacts, ClusterScope, PerfBasis, SizingParameters, StorageFacts};
use crate::services::solver::billable_cores;
use crate::services::table::resolve::{
    cell_text, coerce_number, column_mode, max_by_column, numeric_mode, sum_column, sum_in_tb,
    text_column_mode, ColumnMap, FieldSpec,
};
use crate::services::workbook::Workbook;

use super::{
    distinct_clusters, filter_powered_on, filter_scope, local_disk_signatures_absent, sheet_table,
};

pub const SHEET_VMS: &str = "VMs";
pub const SHEET_HOSTS: &str = "ESX Hosts";
pub const SHEET_DEVICES: &str = "Host Devices";
pub const SHEET_PERFORMANCE: &str = "ESX Performance";
pub const SHEET_LICENSES: &str = "ESX Licenses";

const VM_HEADER: &[&str] = &["vm name", "virtual cpu"];
const HOST_HEADER: &[&str] = &["cpu sockets", "cpu cores"];
const DEVICE_HEADER: &[&str] = &["capacity"];
const PERF_HEADER: &[&str] = &["cpu (ghz)"];
const LICENSE_HEADER: &[&str] = &["software title"];

const VM_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: "name", keywords: &["vm name", "vm"] },
    FieldSpec { field: "cluster", keywords: &["cluster"] },
    FieldSpec { field: "power_state", keywords: &["power state", "powerstate"] },
    FieldSpec { field: "vcpus", keywords: &["virtual cpu"] },
    FieldSpec { field: "memory_mib", keywords: &["provisioned memory"] },
];

const HOST_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: "cluster", keywords: &["cluster"] },
    FieldSpec { field: "sockets", keywords: &["cpu sockets"] },
    FieldSpec { field: "cores", keywords: &["cpu cores"] },
    FieldSpec { field: "memory_kib", keywords: &["memory (kib)", "memory"] },
];

const DEVICE_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: "model", keywords: &["display name", "model", "product"] },
    FieldSpec { field: "local", keywords: &["local"] },
];

const PERF_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: "cluster", keywords: &["cluster"] },
    FieldSpec { field: "p95_ghz", keywords: &["95th percentile cpu"] },
    FieldSpec { field: "peak_ghz", keywords: &["peak cpu"] },
    FieldSpec { field: "avg_ghz", keywords: &["average cpu"] },
];

const LICENSE_FIELDS: &[FieldSpec] = &[FieldSpec { field: "title", keywords: &["software title"] }];

// Device naming that betrays host-local disks behind a RAID controller.
const LOCAL_SIGNATURES: &[&str] = &["local", "raid", "perc", "logical"];

pub fn extract(workbook: &Workbook, params: &SizingParameters) -> CanonicalFacts {
    let scope = ClusterScope::from_selection(&params.clusters);
    let mut facts = CanonicalFacts::default();

    // VM demand
    let vms_all = sheet_table(workbook, SHEET_VMS, VM_HEADER);
    let vm_map = ColumnMap::bind(&vms_all, VM_FIELDS);
    let vms = filter_scope(&vms_all, vm_map.col("cluster"), &scope);
    let vms = if params.include_powered_off {
        vms
    } else {
        filter_powered_on(&vms, vm_map.col("power_state"))
    };

    facts.vm_count = vms.row_count();
    facts.total_vcpu = sum_column(&vms, vm_map.col("vcpus"));
    facts.total_vram_gb = sum_column(&vms, vm_map.col("memory_mib")) / 1024.0;
    facts.provisioned_tb = sum_in_tb(&vms, "Virtual Disk Size");
    facts.used_tb = sum_in_tb(&vms, "Virtual Disk Used");
    facts.guest_used_tb = sum_in_tb(&vms, "Guest VM Disk Used");

    let name_col = vm_map.col("name");
    if let Some((row, value)) = max_by_column(&vms, vm_map.col("vcpus")) {
        facts.outliers.max_vcpu = value;
        if let Some(col) = name_col {
            let name = cell_text(vms.value(row, col));
            if !name.is_empty() {
                facts.outliers.max_vcpu_name = name;
            }
        }
    }
    if let Some((row, value)) = max_by_column(&vms, vm_map.col("memory_mib")) {
        facts.outliers.max_ram_gb = value / 1024.0;
        if let Some(col) = name_col {
            let name = cell_text(vms.value(row, col));
            if !name.is_empty() {
                facts.outliers.max_ram_name = name;
            }
        }
    }

    // Host supply. This format reports total cores per host, not cores
    // per socket, so the per-socket figure is derived row by row.
    let hosts_all = sheet_table(workbook, SHEET_HOSTS, HOST_HEADER);
    let host_map = ColumnMap::bind(&hosts_all, HOST_FIELDS);
    let hosts = filter_scope(&hosts_all, host_map.col("cluster"), &scope);
    facts.host_count = hosts.row_count();

    let sock_col = host_map.col("sockets");
    let core_col = host_map.col("cores");
    facts.total_pcores = sum_column(&hosts, core_col);
    facts.total_pram_gb = sum_column(&hosts, host_map.col("memory_kib")) / 1024.0 / 1024.0;

    let mut cores_per_socket: Vec<f64> = Vec::new();
    for row in hosts.rows() {
        let sockets = sock_col.and_then(|c| row.get(c)).and_then(coerce_number);
        let cores = core_col.and_then(|c| row.get(c)).and_then(coerce_number);
        match (sockets, cores) {
            (Some(sockets), Some(cores)) if sockets > 0.0 => {
                cores_per_socket.push(cores / sockets);
                facts.license_cores += billable_cores(sockets, cores / sockets);
            }
            // Malformed row: no licensing or NUMA contribution.
            _ => continue,
        }
    }

    let sockets_mode = column_mode(&hosts, sock_col);
    facts.numa_cores_est = numeric_mode(cores_per_socket).unwrap_or(0.0);
    facts.numa_ram_gb_est = match sockets_mode {
        Some(sockets) if sockets > 0.0 && facts.host_count > 0 => {
            (facts.total_pram_gb / facts.host_count as f64) / sockets
        }
        _ => 0.0,
    };

    // LUN capacity; no cluster column here, so the figure stays global.
    if workbook.contains(SHEET_DEVICES) {
        let devices_all = sheet_table(workbook, SHEET_DEVICES, DEVICE_HEADER);
        let dev_map = ColumnMap::bind(&devices_all, DEVICE_FIELDS);

        facts.no_local_disk_signatures =
            local_disk_signatures_absent(&devices_all, dev_map.col("model"), LOCAL_SIGNATURES);

        let shared = match dev_map.col("local") {
            Some(col) => devices_all.filtered(|row| {
                !cell_text(row.get(col).unwrap_or(&Data::Empty))
                    .to_lowercase()
                    .contains("true")
            }),
            None => devices_all,
        };

        facts.storage = StorageFacts {
            capacity_tb: sum_in_tb(&shared, "Capacity"),
            used_tb: sum_in_tb(&shared, "Used Capacity"),
            free_tb: sum_in_tb(&shared, "Free Capacity"),
            provisioned_tb: 0.0,
            provenance: "Derived from Host Devices (LUNs)".to_string(),
        };
    }

    // Captured CPU consumption
    if workbook.contains(SHEET_PERFORMANCE) {
        let perf_all = sheet_table(workbook, SHEET_PERFORMANCE, PERF_HEADER);
        let perf_map = ColumnMap::bind(&perf_all, PERF_FIELDS);
        let perf = filter_scope(&perf_all, perf_map.col("cluster"), &scope);

        facts.has_perf = true;
        facts.perf_demand_ghz = match params.perf_basis {
            PerfBasis::P95 => match perf_map.col("p95_ghz") {
                Some(col) => sum_column(&perf, Some(col)),
                // Older captures lack the percentile column; estimate
                // from peak.
                None => sum_column(&perf, perf_map.col("peak_ghz")) * 0.95,
            },
            PerfBasis::Peak => sum_column(&perf, perf_map.col("peak_ghz")),
            PerfBasis::Average => sum_column(&perf, perf_map.col("avg_ghz")),
        };
        tracing::info!(
            "Captured CPU demand: {:.1} GHz ({} basis)",
            facts.perf_demand_ghz,
            params.perf_basis.label()
        );
    }

    // Edition label
    let licenses = sheet_table(workbook, SHEET_LICENSES, LICENSE_HEADER);
    let lic_map = ColumnMap::bind(&licenses, LICENSE_FIELDS);
    if let Some(edition) = text_column_mode(&licenses, lic_map.col("title")) {
        facts.license_edition = edition;
    }

    facts
}

pub fn clusters(workbook: &Workbook) -> Vec<String> {
    let vms = sheet_table(workbook, SHEET_VMS, VM_HEADER);
    let map = ColumnMap::bind(&vms, VM_FIELDS);
    distinct_clusters(&vms, map.col("cluster"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SizingParameters;
    use crate::services::workbook::{Grid, Workbook};

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn n(v: f64) -> Data {
        Data::Float(v)
    }

    fn vm_grid() -> Grid {
        vec![
            vec![s("Collected by Live Optics")],
            vec![],
            vec![
                s("VM Name"),
                s("Cluster"),
                s("Power State"),
                s("Virtual CPU"),
                s("Provisioned Memory (MiB)"),
                s("Virtual Disk Size (MiB)"),
                s("Virtual Disk Used (MiB)"),
                s("Guest VM Disk Used (MiB)"),
            ],
            vec![
                s("web01"),
                s("Prod"),
                s("poweredOn"),
                n(8.0),
                n(32768.0),
                n(1_048_576.0),
                n(524_288.0),
                n(262_144.0),
            ],
            vec![
                s("dev01"),
                s("Dev"),
                s("poweredOff"),
                n(2.0),
                n(8192.0),
                n(524_288.0),
                n(262_144.0),
                n(131_072.0),
            ],
        ]
    }

    fn host_grid() -> Grid {
        vec![
            vec![s("Host"), s("Cluster"), s("CPU Sockets"), s("CPU Cores"), s("Memory (KiB)")],
            vec![s("esx01"), s("Prod"), n(2.0), n(48.0), n(536_870_912.0)],
            vec![s("esx02"), s("Prod"), n(2.0), n(48.0), n(536_870_912.0)],
        ]
    }

    fn perf_grid() -> Grid {
        vec![
            vec![
                s("Host"),
                s("Cluster"),
                s("Average CPU (GHz)"),
                s("Peak CPU (GHz)"),
                s("95th Percentile CPU (GHz)"),
            ],
            vec![s("esx01"), s("Prod"), n(10.0), n(40.0), n(30.0)],
            vec![s("esx02"), s("Prod"), n(12.0), n(60.0), n(45.0)],
        ]
    }

    fn workbook(sheets: Vec<(&str, Grid)>) -> Workbook {
        Workbook::from_sheets(sheets.into_iter().map(|(n, g)| (n.to_string(), g)))
    }

    fn base_sheets() -> Vec<(&'static str, Grid)> {
        vec![("VMs", vm_grid()), ("ESX Hosts", host_grid())]
    }

    #[test]
    fn header_promotion_skips_banner_rows() {
        let wb = workbook(base_sheets());
        let facts = extract(&wb, &SizingParameters::default());
        assert_eq!(facts.vm_count, 2);
        assert_eq!(facts.total_vcpu, 10.0);
        assert!((facts.total_vram_gb - 40.0).abs() < 1e-9);
        assert!((facts.provisioned_tb - 1.5).abs() < 1e-9);
        assert!((facts.used_tb - 0.75).abs() < 1e-9);
    }

    #[test]
    fn host_supply_converts_kib_and_accrues_licensing() {
        let wb = workbook(base_sheets());
        let facts = extract(&wb, &SizingParameters::default());
        assert_eq!(facts.host_count, 2);
        assert_eq!(facts.total_pcores, 96.0);
        assert!((facts.total_pram_gb - 1024.0).abs() < 1e-9);
        // 24 cores/socket billed as-is: 2 hosts x 2 x 24.
        assert_eq!(facts.license_cores, 96.0);
        assert_eq!(facts.numa_cores_est, 24.0);
        assert!((facts.numa_ram_gb_est - 256.0).abs() < 1e-9);
    }

    #[test]
    fn small_sockets_hit_the_billing_floor() {
        let hosts = vec![
            vec![s("Host"), s("CPU Sockets"), s("CPU Cores")],
            vec![s("esx01"), n(2.0), n(16.0)],
        ];
        let wb = workbook(vec![("VMs", vm_grid()), ("ESX Hosts", hosts)]);
        let facts = extract(&wb, &SizingParameters::default());
        // 8 cores/socket bills as 16: 2 x 16.
        assert_eq!(facts.license_cores, 32.0);
    }

    #[test]
    fn p95_prefers_explicit_column() {
        let mut sheets = base_sheets();
        sheets.push(("ESX Performance", perf_grid()));
        let wb = workbook(sheets);
        let facts = extract(&wb, &SizingParameters::default());
        assert!(facts.has_perf);
        assert!((facts.perf_demand_ghz - 75.0).abs() < 1e-9);
    }

    #[test]
    fn p95_falls_back_to_derated_peak() {
        let perf = vec![
            vec![s("Host"), s("Average CPU (GHz)"), s("Peak CPU (GHz)")],
            vec![s("esx01"), n(10.0), n(40.0)],
            vec![s("esx02"), n(12.0), n(60.0)],
        ];
        let mut sheets = base_sheets();
        sheets.push(("ESX Performance", perf));
        let wb = workbook(sheets);
        let facts = extract(&wb, &SizingParameters::default());
        assert!((facts.perf_demand_ghz - 95.0).abs() < 1e-9);
    }

    #[test]
    fn basis_selects_peak_or_average() {
        let mut sheets = base_sheets();
        sheets.push(("ESX Performance", perf_grid()));
        let wb = workbook(sheets);

        let peak = SizingParameters { perf_basis: PerfBasis::Peak, ..Default::default() };
        assert!((extract(&wb, &peak).perf_demand_ghz - 100.0).abs() < 1e-9);

        let avg = SizingParameters { perf_basis: PerfBasis::Average, ..Default::default() };
        assert!((extract(&wb, &avg).perf_demand_ghz - 22.0).abs() < 1e-9);
    }

    #[test]
    fn no_performance_sheet_means_no_perf_facts() {
        let wb = workbook(base_sheets());
        let facts = extract(&wb, &SizingParameters::default());
        assert!(!facts.has_perf);
        assert_eq!(facts.perf_demand_ghz, 0.0);
    }

    #[test]
    fn lun_capacity_and_local_disk_signal() {
        let devices = vec![
            vec![s("Display Name"), s("Local"), s("Capacity (GiB)"), s("Used Capacity (GiB)"), s("Free Capacity (GiB)")],
            vec![s("NETAPP LUN 0001"), s("False"), n(4096.0), n(2048.0), n(2048.0)],
            vec![s("PERC H730 Logical Disk"), s("True"), n(1024.0), n(512.0), n(512.0)],
        ];
        let mut sheets = base_sheets();
        sheets.push(("Host Devices", devices));
        let wb = workbook(sheets);
        let facts = extract(&wb, &SizingParameters::default());
        // Local device excluded from the shared totals.
        assert!((facts.storage.capacity_tb - 4.0).abs() < 1e-9);
        assert!((facts.storage.used_tb - 2.0).abs() < 1e-9);
        assert!((facts.storage.free_tb - 2.0).abs() < 1e-9);
        assert_eq!(facts.storage.provenance, "Derived from Host Devices (LUNs)");
        // The RAID-controller name defeats the signal.
        assert!(!facts.no_local_disk_signatures);
    }

    #[test]
    fn all_shared_devices_raise_the_sds_signal() {
        let devices = vec![
            vec![s("Display Name"), s("Capacity (GiB)")],
            vec![s("NETAPP LUN 0001"), n(4096.0)],
            vec![s("NETAPP LUN 0002"), n(4096.0)],
        ];
        let mut sheets = base_sheets();
        sheets.push(("Host Devices", devices));
        let wb = workbook(sheets);
        let facts = extract(&wb, &SizingParameters::default());
        assert!(facts.no_local_disk_signatures);
    }

    #[test]
    fn license_edition_from_software_title_mode() {
        let licenses = vec![
            vec![s("Software Title"), s("Quantity")],
            vec![s("VMware vSphere Enterprise Plus"), n(4.0)],
            vec![s("VMware vSphere Enterprise Plus"), n(2.0)],
            vec![s("VMware vCenter Server"), n(1.0)],
        ];
        let mut sheets = base_sheets();
        sheets.push(("ESX Licenses", licenses));
        let wb = workbook(sheets);
        let facts = extract(&wb, &SizingParameters::default());
        assert_eq!(facts.license_edition, "VMware vSphere Enterprise Plus");
    }

    #[test]
    fn outliers_use_vm_names() {
        let wb = workbook(base_sheets());
        let facts = extract(&wb, &SizingParameters::default());
        assert_eq!(facts.outliers.max_vcpu, 8.0);
        assert_eq!(facts.outliers.max_vcpu_name, "web01");
        assert!((facts.outliers.max_ram_gb - 32.0).abs() < 1e-9);
    }
}
