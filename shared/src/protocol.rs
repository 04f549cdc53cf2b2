/// mDNS service type announced by every Machinekit service
pub const MACHINEKIT_SERVICE_TYPE: &str = "_machinekit._tcp.local.";

/// TXT record keys carried by Machinekit announcements
pub const TXT_SERVICE: &str = "service";
pub const TXT_INSTANCE: &str = "instance";
pub const TXT_UUID: &str = "uuid";
pub const TXT_DSN: &str = "dsn";

/// Attribute re-attached to resolved announcements, holding the full record name
pub const ATTR_NAME: &str = "name";

/// Query path answering with every known local service
pub const AGGREGATE_PATH: &str = "machinekit";
