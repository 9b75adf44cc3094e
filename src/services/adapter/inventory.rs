//! Inventory-style (RVTools) export adapter.
//!
//! Sheet layout: `vInfo` carries the VM demand, `vHost` the host supply,
//! `vDatastore` shared storage, `vPartition` guest-consumed space and
//! `vDisk` raw device mappings. Headers sit on the first row but labels
//! drift across tool versions, so everything goes through keyword
//! resolution.

use std::collections::HashSet;

use calamine::Data;

use crate::models::{CanonicalFacts, ClusterScope, SizingParameters, StorageFacts};
use crate::services::solver::billable_cores;
use crate::services::table::resolve::{
    cell_text, coerce_number, column_mode, max_by_column, sum_column, sum_in_tb, text_column_mode,
    ColumnMap, FieldSpec,
};
use crate::services::workbook::Workbook;

use super::{
    distinct_clusters, filter_powered_on, filter_scope, local_disk_signatures_absent, sheet_table,
};

pub const SHEET_VMS: &str = "vInfo";
pub const SHEET_HOSTS: &str = "vHost";
pub const SHEET_DATASTORES: &str = "vDatastore";
pub const SHEET_PARTITIONS: &str = "vPartition";
pub const SHEET_DISKS: &str = "vDisk";

const VM_HEADER: &[&str] = &["vm", "cpus"];
const HOST_HEADER: &[&str] = &["# cpu", "cores per cpu"];
const DATASTORE_HEADER: &[&str] = &["name", "capacity"];
const PARTITION_HEADER: &[&str] = &["vm", "consumed"];
const DISK_HEADER: &[&str] = &["vm", "capacity"];

const VM_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: "name", keywords: &["vm"] },
    FieldSpec { field: "cluster", keywords: &["cluster"] },
    FieldSpec { field: "power_state", keywords: &["powerstate", "power state"] },
    FieldSpec { field: "vcpus", keywords: &["cpus"] },
    FieldSpec { field: "memory_gb", keywords: &["memory gb"] },
    FieldSpec { field: "memory", keywords: &["memory"] },
];

const HOST_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: "cluster", keywords: &["cluster"] },
    FieldSpec { field: "sockets", keywords: &["# cpu"] },
    FieldSpec { field: "cores_per_socket", keywords: &["cores per cpu"] },
    FieldSpec { field: "memory_mib", keywords: &["# memory"] },
    FieldSpec { field: "product", keywords: &["product"] },
];

const DATASTORE_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: "name", keywords: &["name"] },
    FieldSpec { field: "cluster", keywords: &["cluster"] },
];

const PARTITION_FIELDS: &[FieldSpec] = &[FieldSpec { field: "vm", keywords: &["vm"] }];

const DISK_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: "vm", keywords: &["vm"] },
    FieldSpec { field: "raw", keywords: &["raw"] },
];

// Datastore naming is the only local-disk hint this format carries.
const LOCAL_SIGNATURES: &[&str] = &["local"];

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

    // Newer exports carry an explicit GB column; older ones only the
    // MiB-valued "Memory".
    let (ram_col, ram_divisor) = match vm_map.col("memory_gb") {
        Some(col) => (Some(col), 1.0),
        None => (vm_map.col("memory"), 1024.0),
    };
    facts.total_vram_gb = sum_column(&vms, ram_col) / ram_divisor;
    facts.provisioned_tb = sum_in_tb(&vms, "Provisioned");
    facts.used_tb = sum_in_tb(&vms, "In Use");

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
    if let Some((row, value)) = max_by_column(&vms, ram_col) {
        facts.outliers.max_ram_gb = value / ram_divisor;
        if let Some(col) = name_col {
            let name = cell_text(vms.value(row, col));
            if !name.is_empty() {
                facts.outliers.max_ram_name = name;
            }
        }
    }

    let vm_names: HashSet<String> = match name_col {
        Some(col) => vms
            .rows()
            .iter()
            .map(|row| cell_text(row.get(col).unwrap_or(&Data::Empty)))
            .filter(|name| !name.is_empty())
            .collect(),
        None => HashSet::new(),
    };

    // Host supply
    let hosts_all = sheet_table(workbook, SHEET_HOSTS, HOST_HEADER);
    let host_map = ColumnMap::bind(&hosts_all, HOST_FIELDS);
    let hosts = filter_scope(&hosts_all, host_map.col("cluster"), &scope);
    facts.host_count = hosts.row_count();

    let sock_col = host_map.col("sockets");
    let core_col = host_map.col("cores_per_socket");
    let mem_col = host_map.col("memory_mib");

    for row in hosts.rows() {
        let sockets = sock_col.and_then(|c| row.get(c)).and_then(coerce_number);
        let cores = core_col.and_then(|c| row.get(c)).and_then(coerce_number);
        // A malformed host row drops out of both totals; the rest proceed.
        if let (Some(sockets), Some(cores)) = (sockets, cores) {
            facts.total_pcores += sockets * cores;
            facts.license_cores += billable_cores(sockets, cores);
        }
    }
    facts.total_pram_gb = sum_column(&hosts, mem_col) / 1024.0;

    // Fleet is assumed mostly homogeneous: the mode resists the odd
    // mismatched host better than the mean.
    let sockets_mode = column_mode(&hosts, sock_col);
    facts.numa_cores_est = column_mode(&hosts, core_col).unwrap_or(0.0);
    facts.numa_ram_gb_est = match (column_mode(&hosts, mem_col), sockets_mode) {
        (Some(ram_mib), Some(sockets)) if sockets > 0.0 => (ram_mib / 1024.0) / sockets,
        _ => 0.0,
    };

    if let Some(edition) = text_column_mode(&hosts, host_map.col("product")) {
        facts.license_edition = edition;
    }

    // Shared storage
    if workbook.contains(SHEET_DATASTORES) {
        let ds_all = sheet_table(workbook, SHEET_DATASTORES, DATASTORE_HEADER);
        let ds_map = ColumnMap::bind(&ds_all, DATASTORE_FIELDS);

        facts.no_local_disk_signatures =
            local_disk_signatures_absent(&ds_all, ds_map.col("name"), LOCAL_SIGNATURES);

        let shared = match ds_map.col("name") {
            Some(col) => ds_all.filtered(|row| {
                !cell_text(row.get(col).unwrap_or(&Data::Empty))
                    .to_lowercase()
                    .contains("local")
            }),
            None => ds_all.clone(),
        };
        let (scoped, provenance) = match (ds_map.col("cluster"), scope.is_all()) {
            (Some(col), false) => (
                filter_scope(&shared, Some(col), &scope),
                format!("Filtered to {}", scope.label()),
            ),
            _ => (shared, "Global".to_string()),
        };

        let capacity_tb = sum_in_tb(&scoped, "Capacity");
        let used_tb = sum_in_tb(&scoped, "In Use");
        facts.storage = StorageFacts {
            capacity_tb,
            used_tb,
            free_tb: capacity_tb - used_tb,
            provisioned_tb: sum_in_tb(&scoped, "Provisioned"),
            provenance,
        };
    }

    // Guest-consumed space, scoped to the VMs under analysis
    let parts_all = sheet_table(workbook, SHEET_PARTITIONS, PARTITION_HEADER);
    let part_map = ColumnMap::bind(&parts_all, PARTITION_FIELDS);
    let parts = match (part_map.col("vm"), name_col) {
        (Some(col), Some(_)) => parts_all.filtered(|row| {
            vm_names.contains(&cell_text(row.get(col).unwrap_or(&Data::Empty)))
        }),
        _ => parts_all,
    };
    facts.guest_used_tb = sum_in_tb(&parts, "Consumed");

    // Raw device mappings
    let disks_all = sheet_table(workbook, SHEET_DISKS, DISK_HEADER);
    let disk_map = ColumnMap::bind(&disks_all, DISK_FIELDS);
    let disks = match (disk_map.col("vm"), name_col) {
        (Some(col), Some(_)) => disks_all.filtered(|row| {
            vm_names.contains(&cell_text(row.get(col).unwrap_or(&Data::Empty)))
        }),
        _ => disks_all,
    };
    if let Some(raw_col) = disk_map.col("raw") {
        let rdm = disks.filtered(|row| {
            cell_text(row.get(raw_col).unwrap_or(&Data::Empty))
                .to_lowercase()
                .contains("true")
        });
        facts.rdm_count = rdm.row_count();
        facts.rdm_tb = sum_in_tb(&rdm, "Capacity");
    }

    facts
}

pub fn clusters(workbook: &Workbook) -> Vec<String> {
    let vms = sheet_table(workbook, SHEET_VMS, VM_HEADER);
    let map = ColumnMap::bind(&vms, VM_FIELDS);
    distinct_clusters(&vms, map.col("cluster"))
}
