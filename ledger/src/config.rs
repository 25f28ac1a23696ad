//! # Constants & Defaults
//!
//! Every tunable number for the custody vault lives here. The node reads
//! these as CLI defaults; tests read them so they don't drift.

/// Crate version, surfaced by `/status` and `custody-node version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Decimal places of the reference token and of native currency.
/// Display only; the ledger never divides.
pub const ASSET_DECIMALS: u8 = 18;

/// One whole unit in smallest-unit denomination (`10^18`).
pub const ONE_UNIT: u128 = 1_000_000_000_000_000_000;

/// Supply minted to the deployer when the node boots the reference token.
pub const DEFAULT_TOKEN_SUPPLY: u128 = 1_000_000 * ONE_UNIT;

/// Name and symbol of the reference token.
pub const DEFAULT_TOKEN_NAME: &str = "Custody Test Token";
pub const DEFAULT_TOKEN_SYMBOL: &str = "CTT";

/// Address of the vault's own account on the asset ledger when the node
/// does not override it.
pub const DEFAULT_CUSTODIAN_ADDRESS: &str = "vault:custodian";

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_API_PORT: u16 = 9841;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Capacity of the committed-event broadcast channel. Slow WebSocket
/// subscribers past this many events get a `Lagged` notice.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Maximum number of events returned by a single `/events` page.
pub const MAX_EVENTS_PER_PAGE: usize = 500;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Name of the database directory created under the node's data dir.
pub const DB_DIR_NAME: &str = "vault-db";
