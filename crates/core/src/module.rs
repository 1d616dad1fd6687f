//! The native trading module capability and its value domain
//!
//! The bridge never talks to the terminal directly; it consumes a
//! [`TerminalModule`], the programmatic interface the Wine-side module
//! exposes once loaded. Results come back either as [`Record`]s (flat
//! field-to-value mappings), tuples of records, or typed numeric buffers
//! ([`NumericSeries`]).

use std::sync::Arc;

/// A self-describing native result object.
///
/// One required operation: flatten to an ordered field mapping. Every
/// concrete terminal result type (terminal info, account info, symbol,
/// tick, order, position, deal, book entry) gets a thin adapter
/// implementing this.
pub trait Record: Send + Sync {
    fn fields(&self) -> FieldMap;
}

/// Ordered field-name-to-value mapping produced by a [`Record`].
pub type FieldMap = Vec<(String, FieldValue)>;

/// Value domain of a record field.
#[derive(Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Nested sub-record, e.g. the original request embedded in an
    /// order-check result.
    Record(Arc<dyn Record>),
    /// Already-flattened nested mapping.
    Map(FieldMap),
    /// Numeric-array-like value; serialized as a plain list.
    Array(Vec<FieldValue>),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Look up a field by name.
pub fn field<'a>(map: &'a FieldMap, name: &str) -> Option<&'a FieldValue> {
    map.iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

/// Value copy of a native multi-dimensional numeric buffer (price bars,
/// tick series). Raw bytes plus element-type tag plus shape; no native
/// object ever crosses the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSeries {
    pub data: Vec<u8>,
    pub dtype: String,
    pub shape: Vec<i64>,
}

/// Presence-tracked parameters for `initialize`.
///
/// Absent-vs-present is significant: only fields the caller actually
/// supplied are forwarded to the native module.
#[derive(Debug, Clone, Default)]
pub struct InitParams {
    pub path: Option<String>,
    pub login: Option<i64>,
    pub password: Option<String>,
    pub server: Option<String>,
    pub timeout: Option<i64>,
    pub portable: bool,
}

impl InitParams {
    /// Number of parameters that will be forwarded.
    pub fn supplied(&self) -> usize {
        self.path.is_some() as usize
            + self.login.is_some() as usize
            + self.password.is_some() as usize
            + self.server.is_some() as usize
            + self.timeout.is_some() as usize
            + self.portable as usize
    }
}

/// Optional filters for live position/order queries. Only supplied
/// filters are forwarded; the rest are omitted from the native call.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub symbol: Option<String>,
    pub group: Option<String>,
    pub ticket: Option<i64>,
}

impl QueryFilter {
    pub fn is_empty(&self) -> bool {
        self.symbol.is_none() && self.group.is_none() && self.ticket.is_none()
    }

    pub fn supplied(&self) -> usize {
        self.symbol.is_some() as usize
            + self.group.is_some() as usize
            + self.ticket.is_some() as usize
    }
}

/// Optional filters for history queries.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub group: Option<String>,
    pub ticket: Option<i64>,
    pub position: Option<i64>,
}

impl HistoryFilter {
    pub fn is_empty(&self) -> bool {
        self.group.is_none() && self.ticket.is_none() && self.position.is_none()
    }

    pub fn supplied(&self) -> usize {
        self.group.is_some() as usize
            + self.ticket.is_some() as usize
            + self.position.is_some() as usize
    }
}

/// Order request mapping as received on the wire.
pub type OrderFields = serde_json::Map<String, serde_json::Value>;

/// The consumed capability: the Windows-only trading terminal's
/// programmatic interface, once loaded.
///
/// Every call may block on terminal I/O; the bridge imposes no internal
/// timeout and trusts the transport's per-call deadline. `None` results
/// mean "no data" (terminal not connected, unknown symbol, empty set),
/// never a fault.
pub trait TerminalModule: Send + Sync {
    // Connection lifecycle
    fn initialize(&self, params: &InitParams) -> bool;
    fn login(&self, login: i64, password: &str, server: &str, timeout: i64) -> bool;
    fn shutdown(&self);

    // Diagnostics
    fn version(&self) -> Option<(i64, i64, String)>;
    fn last_error(&self) -> (i64, String);
    fn terminal_info(&self) -> Option<Arc<dyn Record>>;
    fn account_info(&self) -> Option<Arc<dyn Record>>;

    // Reference data
    fn symbols_total(&self) -> Option<i64>;
    fn symbols_get(&self, group: Option<&str>) -> Option<Vec<Arc<dyn Record>>>;
    fn symbol_info(&self, symbol: &str) -> Option<Arc<dyn Record>>;
    fn symbol_info_tick(&self, symbol: &str) -> Option<Arc<dyn Record>>;
    fn symbol_select(&self, symbol: &str, enable: bool) -> bool;

    // Market data
    fn copy_rates_from(
        &self,
        symbol: &str,
        timeframe: i64,
        date_from: i64,
        count: i64,
    ) -> Option<NumericSeries>;
    fn copy_rates_from_pos(
        &self,
        symbol: &str,
        timeframe: i64,
        start_pos: i64,
        count: i64,
    ) -> Option<NumericSeries>;
    fn copy_rates_range(
        &self,
        symbol: &str,
        timeframe: i64,
        date_from: i64,
        date_to: i64,
    ) -> Option<NumericSeries>;
    fn copy_ticks_from(
        &self,
        symbol: &str,
        date_from: i64,
        count: i64,
        flags: i64,
    ) -> Option<NumericSeries>;
    fn copy_ticks_range(
        &self,
        symbol: &str,
        date_from: i64,
        date_to: i64,
        flags: i64,
    ) -> Option<NumericSeries>;

    // Order math
    fn order_calc_margin(
        &self,
        action: i64,
        symbol: &str,
        volume: f64,
        price: f64,
    ) -> Option<f64>;
    fn order_calc_profit(
        &self,
        action: i64,
        symbol: &str,
        volume: f64,
        price_open: f64,
        price_close: f64,
    ) -> Option<f64>;
    fn order_check(&self, request: &OrderFields) -> Option<Arc<dyn Record>>;
    fn order_send(&self, request: &OrderFields) -> Option<Arc<dyn Record>>;

    // Live positions and pending orders
    fn positions_total(&self) -> Option<i64>;
    fn positions_get(&self, filter: &QueryFilter) -> Option<Vec<Arc<dyn Record>>>;
    fn orders_total(&self) -> Option<i64>;
    fn orders_get(&self, filter: &QueryFilter) -> Option<Vec<Arc<dyn Record>>>;

    // History
    fn history_orders_total(&self, date_from: i64, date_to: i64) -> Option<i64>;
    fn history_orders_get(
        &self,
        range: Option<(i64, i64)>,
        filter: &HistoryFilter,
    ) -> Option<Vec<Arc<dyn Record>>>;
    fn history_deals_total(&self, date_from: i64, date_to: i64) -> Option<i64>;
    fn history_deals_get(
        &self,
        range: Option<(i64, i64)>,
        filter: &HistoryFilter,
    ) -> Option<Vec<Arc<dyn Record>>>;

    // Market depth (DOM)
    fn market_book_add(&self, symbol: &str) -> bool;
    fn market_book_get(&self, symbol: &str) -> Option<Vec<Arc<dyn Record>>>;
    fn market_book_release(&self, symbol: &str) -> bool;

    /// Probe a named integer constant. `None` when the loaded module
    /// version does not define the name, or defines it as a non-integer.
    fn constant(&self, name: &str) -> Option<i64>;
}
