use serde::Serialize;
use sysinfo::{Disks, System};

/// Point-in-time host statistics for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SysStats {
    pub mem_used_pct: u8,
    pub disk_avail_pct: u8,
}

impl SysStats {
    pub fn snapshot() -> Self {
        let sys = System::new_all();
        let mem_used_pct =
            (100.0 * (sys.used_memory() as f32 / sys.total_memory() as f32)) as u8;

        let mut disk_avail_pct = 0;
        let disks = Disks::new_with_refreshed_list();
        for disk in &disks {
            if disk.mount_point().to_str() != Some("/") {
                continue;
            }
            disk_avail_pct =
                (100.0 * (disk.available_space() as f32 / disk.total_space() as f32)) as u8;
        }

        SysStats {
            mem_used_pct,
            disk_avail_pct,
        }
    }
}
