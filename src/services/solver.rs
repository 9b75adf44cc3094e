//! Constraint-based host sizing. Pure and deterministic: the same facts
//! and parameters always produce the same result, and every division is
//! guarded so a degenerate zero-workload input sizes to zero hosts
//! (subject to the minimum-cluster floor) instead of faulting.

use crate::models::{BindingConstraint, CanonicalFacts, SizingParameters, SizingResult};

/// Licensing bills every socket for at least this many cores.
pub const LICENSE_CORE_FLOOR: f64 = 16.0;

// Contention headroom applied on top of the CPU buffer when sizing from
// measured GHz demand.
const PERF_DERATE: f64 = 0.8;

pub fn billable_cores(sockets: f64, cores_per_socket: f64) -> f64 {
    sockets * cores_per_socket.max(LICENSE_CORE_FLOOR)
}

fn hosts_for(demand: f64, per_host_capacity: f64) -> u32 {
    if demand <= 0.0 || per_host_capacity <= 0.0 {
        0
    } else {
        (demand / per_host_capacity).ceil() as u32
    }
}

fn guarded_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

pub fn size(facts: &CanonicalFacts, params: &SizingParameters) -> SizingResult {
    let cores_per_host = params.cores_per_host();
    // Buffers are held-back headroom; subtract before any division.
    let effective_cores = cores_per_host * (1.0 - params.cpu_buffer_pct / 100.0);
    let effective_ram = params.ram_per_host_gb * (1.0 - params.ram_buffer_pct / 100.0);

    let cpu_demand = guarded_ratio(facts.total_vcpu, params.max_vcpu_ratio);
    let hosts_for_cpu = hosts_for(cpu_demand, effective_cores);
    let hosts_for_ram = hosts_for(facts.total_vram_gb, effective_ram);

    // Ties report CPU; only a strictly larger RAM count flips it.
    let binding_constraint = if hosts_for_ram > hosts_for_cpu {
        BindingConstraint::Ram
    } else {
        BindingConstraint::Cpu
    };
    let raw_hosts = hosts_for_cpu.max(hosts_for_ram);
    let hosts_now = (raw_hosts + params.ha_nodes).max(params.min_cluster_size);

    // Compound growth, then the same path again.
    let multiplier = (1.0 + params.annual_growth_pct / 100.0).powi(params.projection_years as i32);
    let future_vcpu = facts.total_vcpu * multiplier;
    let future_vram_gb = facts.total_vram_gb * multiplier;
    let future_hosts_for_cpu =
        hosts_for(guarded_ratio(future_vcpu, params.max_vcpu_ratio), effective_cores);
    let future_hosts_for_ram = hosts_for(future_vram_gb, effective_ram);
    let future_raw = future_hosts_for_cpu.max(future_hosts_for_ram);
    let hosts_future = (future_raw + params.ha_nodes).max(params.min_cluster_size);

    let current_ratio = guarded_ratio(facts.total_vcpu, facts.total_pcores);
    let sized_ratio = guarded_ratio(facts.total_vcpu, hosts_now as f64 * cores_per_host);
    let failover_ratio = guarded_ratio(
        facts.total_vcpu,
        hosts_now.saturating_sub(params.ha_nodes) as f64 * cores_per_host,
    );
    let future_ratio = guarded_ratio(future_vcpu, hosts_future as f64 * cores_per_host);

    let perf_hosts = if facts.has_perf {
        let usable_ghz_per_host = params.sockets_per_host as f64
            * params.cores_per_socket as f64
            * params.cpu_clock_ghz
            * (1.0 - params.cpu_buffer_pct / 100.0);
        let needed = hosts_for(facts.perf_demand_ghz, usable_ghz_per_host * PERF_DERATE);
        (needed + params.ha_nodes).max(params.min_cluster_size)
    } else {
        0
    };

    let license_per_node = billable_cores(
        params.sockets_per_host as f64,
        params.cores_per_socket as f64,
    );
    let license_cores_future = hosts_future as f64 * license_per_node;

    SizingResult {
        hosts_now,
        hosts_future,
        binding_constraint,
        hosts_for_cpu,
        hosts_for_ram,
        future_hosts_for_cpu,
        future_hosts_for_ram,
        raw_hosts,
        future_vcpu,
        future_vram_gb,
        effective_cores_per_host: effective_cores,
        effective_ram_per_host_gb: effective_ram,
        current_ratio,
        sized_ratio,
        failover_ratio,
        future_ratio,
        license_cores_now: facts.license_cores,
        license_cores_future,
        license_core_delta: license_cores_future - facts.license_cores,
        perf_hosts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalFacts;

    fn facts(total_vcpu: f64, total_vram_gb: f64) -> CanonicalFacts {
        CanonicalFacts {
            total_vcpu,
            total_vram_gb,
            ..Default::default()
        }
    }

    fn params() -> SizingParameters {
        SizingParameters::default()
    }

    #[test]
    fn reference_workload_sizes_to_six_hosts() {
        // 1000 vCPU / 4000 GB against 2x24 cores, 1024 GB, ratio 5,
        // 10% buffers, min 3, HA 1.
        let result = size(&facts(1000.0, 4000.0), &params());
        assert!((result.effective_cores_per_host - 43.2).abs() < 1e-9);
        assert!((result.effective_ram_per_host_gb - 921.6).abs() < 1e-9);
        assert_eq!(result.hosts_for_cpu, 5);
        assert_eq!(result.hosts_for_ram, 5);
        // Equal counts report CPU.
        assert_eq!(result.binding_constraint, BindingConstraint::Cpu);
        assert_eq!(result.hosts_now, 6);
    }

    #[test]
    fn empty_workload_floors_at_minimum_cluster() {
        let result = size(&facts(0.0, 0.0), &params());
        assert_eq!(result.hosts_for_cpu, 0);
        assert_eq!(result.hosts_for_ram, 0);
        assert_eq!(result.hosts_now, 3);
        assert_eq!(result.hosts_future, 3);
    }

    #[test]
    fn growing_demand_never_shrinks_cpu_hosts() {
        let mut previous = 0;
        for vcpu in (0..=2000).step_by(50) {
            let result = size(&facts(vcpu as f64, 0.0), &params());
            assert!(result.hosts_for_cpu >= previous);
            previous = result.hosts_for_cpu;
        }
    }

    #[test]
    fn final_count_respects_both_floors() {
        for raw_vcpu in [0.0, 100.0, 1000.0, 5000.0] {
            let p = SizingParameters {
                min_cluster_size: 4,
                ha_nodes: 2,
                ..Default::default()
            };
            let result = size(&facts(raw_vcpu, 0.0), &p);
            assert!(result.hosts_now >= p.min_cluster_size);
            assert!(result.hosts_now >= result.raw_hosts + p.ha_nodes);
        }
    }

    #[test]
    fn zero_growth_is_idempotent() {
        let p = SizingParameters {
            annual_growth_pct: 0.0,
            ..Default::default()
        };
        let result = size(&facts(1000.0, 4000.0), &p);
        assert_eq!(result.hosts_future, result.hosts_now);
        assert!((result.future_vcpu - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn ram_bound_workload_reports_ram() {
        // Tiny CPU demand, heavy RAM demand.
        let result = size(&facts(10.0, 20000.0), &params());
        assert_eq!(result.binding_constraint, BindingConstraint::Ram);
        assert!(result.hosts_for_ram > result.hosts_for_cpu);
    }

    #[test]
    fn growth_compounds_over_years() {
        let p = SizingParameters {
            annual_growth_pct: 10.0,
            projection_years: 3,
            ..Default::default()
        };
        let result = size(&facts(1000.0, 0.0), &p);
        assert!((result.future_vcpu - 1000.0 * 1.1_f64.powi(3)).abs() < 1e-6);
    }

    #[test]
    fn zero_supply_guards_current_ratio() {
        let result = size(&facts(500.0, 0.0), &params());
        assert_eq!(result.current_ratio, 0.0);
        assert!(result.sized_ratio > 0.0);
    }

    #[test]
    fn failover_ratio_survives_ha_equal_to_cluster() {
        let p = SizingParameters {
            min_cluster_size: 1,
            ha_nodes: 1,
            ..Default::default()
        };
        // One raw host + 1 HA = 2; failover denominator is 1 host.
        let result = size(&facts(50.0, 0.0), &p);
        assert!(result.failover_ratio > 0.0);

        // Degenerate: HA nodes equal the whole cluster, denominator hits
        // zero and the guard must answer 0 rather than NaN.
        let p = SizingParameters {
            min_cluster_size: 1,
            ha_nodes: 2,
            ..Default::default()
        };
        let result = size(&facts(0.0, 0.0), &p);
        assert_eq!(result.failover_ratio, 0.0);
    }

    #[test]
    fn licensing_delta_may_be_negative() {
        let mut f = facts(100.0, 400.0);
        f.license_cores = 2000.0;
        let result = size(&f, &params());
        // hosts_future x 2 x max(24,16) is far below 2000.
        assert!(result.license_core_delta < 0.0);
        assert_eq!(
            result.license_cores_future,
            result.hosts_future as f64 * 48.0
        );
    }

    #[test]
    fn perf_recommendation_only_with_perf_source() {
        let mut f = facts(1000.0, 4000.0);
        let no_perf = size(&f, &params());
        assert_eq!(no_perf.perf_hosts, 0);

        f.has_perf = true;
        f.perf_demand_ghz = 400.0;
        let with_perf = size(&f, &params());
        // Usable: 2 x 24 x 2.5 x 0.9 = 108 GHz; derated 86.4; ceil(400/86.4)=5; +1 HA.
        assert_eq!(with_perf.perf_hosts, 6);
    }

    #[test]
    fn billable_cores_floors_per_socket() {
        assert_eq!(billable_cores(2.0, 20.0), 40.0);
        assert_eq!(billable_cores(1.0, 8.0), 16.0);
        assert_eq!(billable_cores(2.0, 16.0), 32.0);
    }
}
