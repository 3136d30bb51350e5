use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/certhound/certhound.toml";
pub const DEFAULT_TEMP_DIR: &str = "/var/lib/certhound/tmp";

pub const STARTUP_DELAY: Duration = Duration::from_secs(3);
pub const RECHECK_DELAY: Duration = Duration::from_secs(180);

pub const DAILY_RUN_HOUR: u32 = 12;
pub const DAILY_RUN_MINUTE: u32 = 30;

pub const ISSUANCE_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const NOTIFY_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const REQUEST_INTERVAL: Duration = Duration::from_secs(1);
pub const DAILY_QUOTA_NORMAL: u32 = 100;
pub const DAILY_QUOTA_VIP: u32 = 500;

pub const RECHECK_CHANNEL_CAPACITY: usize = 16;
