//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc` states and volume accounting
//! for exercising the reporters end to end.

use super::filesystem::MockFs;
use crate::collector::traits::FsStat;

const GIB: u64 = 1024 * 1024 * 1024;

impl MockFs {
    /// Creates a typical 4-core host with two interfaces, two disks and two
    /// mounted volumes.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();

        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );

        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
Active:          4096000 kB
Inactive:        2048000 kB
SwapTotal:       4096000 kB
SwapFree:        3072000 kB
Dirty:              1024 kB
Writeback:             0 kB
Slab:             512000 kB
SReclaimable:     256000 kB
",
        );

        fs.add_file(
            "/proc/vmstat",
            "\
pgpgin 123456
pgpgout 654321
pswpin 100
pswpout 200
pgfault 999999
pgmajfault 1234
",
        );

        fs.add_file(
            "/proc/net/dev",
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 12345678     9876    0    0    0     0          0         0 12345678     9876    0    0    0     0       0          0
  eth0: 987654321   654321    5   10    0     0          0       100 123456789   456789    2    5    0     0       0          0
",
        );

        fs.add_file(
            "/proc/diskstats",
            "\
   8       0 sda 12345 100 987654 5000 6789 50 456789 3000 0 4000 8000 0 0 0 0
   8       1 sda1 10000 80 800000 4000 5000 40 400000 2500 0 3500 6500 0 0 0 0
 259       0 nvme0n1 50000 200 2000000 10000 30000 150 1500000 8000 5 15000 18000 0 0 0 0
",
        );

        fs.add_file(
            "/proc/mounts",
            "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/sda1 / ext4 rw,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev,mode=755 0 0
/dev/nvme0n1 /data xfs rw,relatime 0 0
cgroup2 /sys/fs/cgroup cgroup2 rw,nosuid,nodev,noexec,relatime 0 0
",
        );

        fs.add_volume(
            "/",
            FsStat {
                total: 100 * GIB,
                free: 40 * GIB,
                available: 35 * GIB,
            },
        );
        fs.add_volume(
            "/data",
            FsStat {
                total: 500 * GIB,
                free: 400 * GIB,
                available: 400 * GIB,
            },
        );

        fs
    }

    /// Typical system whose `/data` volume cannot be queried.
    pub fn with_unreadable_volume() -> Self {
        let mut fs = Self::typical_system();
        fs.remove_volume("/data");
        fs
    }

    /// Typical system with `count` extra interfaces, enough to need several
    /// datagrams for the interface plugin.
    pub fn with_many_interfaces(count: usize) -> Self {
        let mut fs = Self::typical_system();

        let mut content = String::from(
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
",
        );
        for i in 0..count {
            content.push_str(&format!(
                " veth{}: {} {} 0 0 0 0 0 0 {} {} 0 0 0 0 0 0\n",
                i,
                1000 + i,
                10 + i,
                2000 + i,
                20 + i
            ));
        }
        fs.add_file("/proc/net/dev", content);
        fs
    }
}
