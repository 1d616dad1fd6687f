//! Scriptable test double for the native trading module
//!
//! Compiled for this crate's own tests and, behind the `testkit`
//! feature, for downstream crates' tests. The mock records every native
//! call it receives so tests can assert both what was forwarded and what
//! was short-circuited before reaching the module.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::module::{
    FieldMap, FieldValue, HistoryFilter, InitParams, NumericSeries, OrderFields,
    QueryFilter, Record, TerminalModule,
};

/// Build a field map from name/value pairs.
pub fn field_map(entries: &[(&str, FieldValue)]) -> FieldMap {
    entries
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

/// A record backed by a plain field map.
pub struct MapRecord(pub FieldMap);

impl Record for MapRecord {
    fn fields(&self) -> FieldMap {
        self.0.clone()
    }
}

fn json_to_field_value(value: &serde_json::Value) -> FieldValue {
    match value {
        serde_json::Value::Null => FieldValue::Null,
        serde_json::Value::Bool(b) => FieldValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                FieldValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                FieldValue::UInt(u)
            } else {
                FieldValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => FieldValue::Text(s.clone()),
        serde_json::Value::Array(items) => {
            FieldValue::Array(items.iter().map(json_to_field_value).collect())
        }
        serde_json::Value::Object(map) => FieldValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_field_value(v)))
                .collect(),
        ),
    }
}

/// Configurable in-memory module. Every `Option` field scripts one
/// native result; `None` plays the terminal's "no data" answer.
#[derive(Default)]
pub struct MockModule {
    pub constants: HashMap<String, i64>,
    pub init_result: bool,
    pub login_result: bool,
    pub select_result: bool,
    pub book_result: bool,
    pub version: Option<(i64, i64, String)>,
    pub last_error: (i64, String),
    pub terminal_info: Option<FieldMap>,
    pub account_info: Option<FieldMap>,
    pub symbol_count: Option<i64>,
    pub symbols: Option<Vec<FieldMap>>,
    pub symbol_info: Option<FieldMap>,
    pub tick: Option<FieldMap>,
    pub series: Option<NumericSeries>,
    pub margin: Option<f64>,
    pub profit: Option<f64>,
    pub order_result: Option<FieldMap>,
    pub positions: Option<Vec<FieldMap>>,
    pub orders: Option<Vec<FieldMap>>,
    pub history_orders: Option<Vec<FieldMap>>,
    pub history_deals: Option<Vec<FieldMap>>,
    pub book: Option<Vec<FieldMap>>,

    calls: Mutex<Vec<String>>,
    pub seen_init: Mutex<Option<InitParams>>,
    pub seen_query: Mutex<Option<QueryFilter>>,
    pub seen_history: Mutex<Option<(Option<(i64, i64)>, HistoryFilter)>>,
    pub seen_order: Mutex<Option<OrderFields>>,
}

impl MockModule {
    /// A module exposing the standard integer constants of a current
    /// terminal build.
    pub fn with_standard_constants() -> Self {
        let mut constants = HashMap::new();
        let entries: &[(&str, i64)] = &[
            ("TIMEFRAME_M1", 1), ("TIMEFRAME_M2", 2), ("TIMEFRAME_M3", 3),
            ("TIMEFRAME_M4", 4), ("TIMEFRAME_M5", 5), ("TIMEFRAME_M6", 6),
            ("TIMEFRAME_M10", 10), ("TIMEFRAME_M12", 12), ("TIMEFRAME_M15", 15),
            ("TIMEFRAME_M20", 20), ("TIMEFRAME_M30", 30), ("TIMEFRAME_H1", 16385),
            ("TIMEFRAME_H2", 16386), ("TIMEFRAME_H3", 16387), ("TIMEFRAME_H4", 16388),
            ("TIMEFRAME_H6", 16390), ("TIMEFRAME_H8", 16392), ("TIMEFRAME_H12", 16396),
            ("TIMEFRAME_D1", 16408), ("TIMEFRAME_W1", 32769), ("TIMEFRAME_MN1", 49153),
            ("ORDER_TYPE_BUY", 0), ("ORDER_TYPE_SELL", 1), ("ORDER_TYPE_BUY_LIMIT", 2),
            ("ORDER_TYPE_SELL_LIMIT", 3), ("ORDER_TYPE_BUY_STOP", 4),
            ("ORDER_TYPE_SELL_STOP", 5), ("ORDER_TYPE_BUY_STOP_LIMIT", 6),
            ("ORDER_TYPE_SELL_STOP_LIMIT", 7), ("ORDER_TYPE_CLOSE_BY", 8),
            ("TRADE_ACTION_DEAL", 1), ("TRADE_ACTION_PENDING", 5),
            ("TRADE_ACTION_SLTP", 6), ("TRADE_ACTION_MODIFY", 7),
            ("TRADE_ACTION_REMOVE", 8), ("TRADE_ACTION_CLOSE_BY", 10),
            ("ORDER_FILLING_FOK", 0), ("ORDER_FILLING_IOC", 1),
            ("ORDER_FILLING_RETURN", 2), ("ORDER_FILLING_BOC", 3),
            ("ORDER_TIME_GTC", 0), ("ORDER_TIME_DAY", 1),
            ("ORDER_TIME_SPECIFIED", 2), ("ORDER_TIME_SPECIFIED_DAY", 3),
            ("POSITION_TYPE_BUY", 0), ("POSITION_TYPE_SELL", 1),
            ("COPY_TICKS_ALL", -1), ("COPY_TICKS_INFO", 1), ("COPY_TICKS_TRADE", 2),
            ("BOOK_TYPE_SELL", 1), ("BOOK_TYPE_BUY", 2),
            ("BOOK_TYPE_SELL_MARKET", 3), ("BOOK_TYPE_BUY_MARKET", 4),
            ("ACCOUNT_TRADE_MODE_DEMO", 0), ("ACCOUNT_TRADE_MODE_CONTEST", 1),
            ("ACCOUNT_TRADE_MODE_REAL", 2),
            ("TRADE_RETCODE_REQUOTE", 10004), ("TRADE_RETCODE_REJECT", 10006),
            ("TRADE_RETCODE_CANCEL", 10007), ("TRADE_RETCODE_PLACED", 10008),
            ("TRADE_RETCODE_DONE", 10009), ("TRADE_RETCODE_DONE_PARTIAL", 10010),
            ("TRADE_RETCODE_ERROR", 10011), ("TRADE_RETCODE_TIMEOUT", 10012),
            ("TRADE_RETCODE_INVALID", 10013), ("TRADE_RETCODE_INVALID_VOLUME", 10014),
            ("TRADE_RETCODE_INVALID_PRICE", 10015), ("TRADE_RETCODE_INVALID_STOPS", 10016),
            ("TRADE_RETCODE_TRADE_DISABLED", 10017), ("TRADE_RETCODE_MARKET_CLOSED", 10018),
            ("TRADE_RETCODE_NO_MONEY", 10019), ("TRADE_RETCODE_PRICE_CHANGED", 10020),
            ("TRADE_RETCODE_PRICE_OFF", 10021), ("TRADE_RETCODE_INVALID_EXPIRATION", 10022),
            ("TRADE_RETCODE_ORDER_CHANGED", 10023), ("TRADE_RETCODE_TOO_MANY_REQUESTS", 10024),
            ("TRADE_RETCODE_NO_CHANGES", 10025), ("TRADE_RETCODE_LOCKED", 10028),
            ("TRADE_RETCODE_FROZEN", 10029), ("TRADE_RETCODE_INVALID_FILL", 10030),
            ("TRADE_RETCODE_CONNECTION", 10031), ("TRADE_RETCODE_ONLY_REAL", 10032),
            ("TRADE_RETCODE_LIMIT_ORDERS", 10033), ("TRADE_RETCODE_LIMIT_VOLUME", 10034),
        ];
        for (name, value) in entries {
            constants.insert((*name).to_string(), *value);
        }
        Self {
            constants,
            ..Self::default()
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }

    /// Names of every native call received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.lock().iter().any(|c| c == name)
    }

    fn record_of(map: &Option<FieldMap>) -> Option<Arc<dyn Record>> {
        map.clone()
            .map(|fields| Arc::new(MapRecord(fields)) as Arc<dyn Record>)
    }

    fn records_of(maps: &Option<Vec<FieldMap>>) -> Option<Vec<Arc<dyn Record>>> {
        maps.clone().map(|items| {
            items
                .into_iter()
                .map(|fields| Arc::new(MapRecord(fields)) as Arc<dyn Record>)
                .collect()
        })
    }

    fn order_reply(&self, request: &OrderFields) -> Option<Arc<dyn Record>> {
        self.order_result.clone().map(|mut fields| {
            let nested: FieldMap = request
                .iter()
                .map(|(k, v)| (k.clone(), json_to_field_value(v)))
                .collect();
            fields.push((
                "request".to_string(),
                FieldValue::Record(Arc::new(MapRecord(nested))),
            ));
            Arc::new(MapRecord(fields)) as Arc<dyn Record>
        })
    }
}

impl TerminalModule for MockModule {
    fn initialize(&self, params: &InitParams) -> bool {
        self.record("initialize");
        *self.seen_init.lock() = Some(params.clone());
        self.init_result
    }

    fn login(&self, _login: i64, _password: &str, _server: &str, _timeout: i64) -> bool {
        self.record("login");
        self.login_result
    }

    fn shutdown(&self) {
        self.record("shutdown");
    }

    fn version(&self) -> Option<(i64, i64, String)> {
        self.record("version");
        self.version.clone()
    }

    fn last_error(&self) -> (i64, String) {
        self.record("last_error");
        self.last_error.clone()
    }

    fn terminal_info(&self) -> Option<Arc<dyn Record>> {
        self.record("terminal_info");
        Self::record_of(&self.terminal_info)
    }

    fn account_info(&self) -> Option<Arc<dyn Record>> {
        self.record("account_info");
        Self::record_of(&self.account_info)
    }

    fn symbols_total(&self) -> Option<i64> {
        self.record("symbols_total");
        self.symbol_count
    }

    fn symbols_get(&self, group: Option<&str>) -> Option<Vec<Arc<dyn Record>>> {
        self.record(&format!("symbols_get(group={group:?})"));
        Self::records_of(&self.symbols)
    }

    fn symbol_info(&self, _symbol: &str) -> Option<Arc<dyn Record>> {
        self.record("symbol_info");
        Self::record_of(&self.symbol_info)
    }

    fn symbol_info_tick(&self, _symbol: &str) -> Option<Arc<dyn Record>> {
        self.record("symbol_info_tick");
        Self::record_of(&self.tick)
    }

    fn symbol_select(&self, _symbol: &str, _enable: bool) -> bool {
        self.record("symbol_select");
        self.select_result
    }

    fn copy_rates_from(
        &self,
        _symbol: &str,
        _timeframe: i64,
        _date_from: i64,
        _count: i64,
    ) -> Option<NumericSeries> {
        self.record("copy_rates_from");
        self.series.clone()
    }

    fn copy_rates_from_pos(
        &self,
        _symbol: &str,
        _timeframe: i64,
        _start_pos: i64,
        _count: i64,
    ) -> Option<NumericSeries> {
        self.record("copy_rates_from_pos");
        self.series.clone()
    }

    fn copy_rates_range(
        &self,
        _symbol: &str,
        _timeframe: i64,
        _date_from: i64,
        _date_to: i64,
    ) -> Option<NumericSeries> {
        self.record("copy_rates_range");
        self.series.clone()
    }

    fn copy_ticks_from(
        &self,
        _symbol: &str,
        _date_from: i64,
        _count: i64,
        _flags: i64,
    ) -> Option<NumericSeries> {
        self.record("copy_ticks_from");
        self.series.clone()
    }

    fn copy_ticks_range(
        &self,
        _symbol: &str,
        _date_from: i64,
        _date_to: i64,
        _flags: i64,
    ) -> Option<NumericSeries> {
        self.record("copy_ticks_range");
        self.series.clone()
    }

    fn order_calc_margin(
        &self,
        _action: i64,
        _symbol: &str,
        _volume: f64,
        _price: f64,
    ) -> Option<f64> {
        self.record("order_calc_margin");
        self.margin
    }

    fn order_calc_profit(
        &self,
        _action: i64,
        _symbol: &str,
        _volume: f64,
        _price_open: f64,
        _price_close: f64,
    ) -> Option<f64> {
        self.record("order_calc_profit");
        self.profit
    }

    fn order_check(&self, request: &OrderFields) -> Option<Arc<dyn Record>> {
        self.record("order_check");
        *self.seen_order.lock() = Some(request.clone());
        self.order_reply(request)
    }

    fn order_send(&self, request: &OrderFields) -> Option<Arc<dyn Record>> {
        self.record("order_send");
        *self.seen_order.lock() = Some(request.clone());
        self.order_reply(request)
    }

    fn positions_total(&self) -> Option<i64> {
        self.record("positions_total");
        self.positions.as_ref().map(|p| p.len() as i64)
    }

    fn positions_get(&self, filter: &QueryFilter) -> Option<Vec<Arc<dyn Record>>> {
        self.record("positions_get");
        *self.seen_query.lock() = Some(filter.clone());
        Self::records_of(&self.positions)
    }

    fn orders_total(&self) -> Option<i64> {
        self.record("orders_total");
        self.orders.as_ref().map(|o| o.len() as i64)
    }

    fn orders_get(&self, filter: &QueryFilter) -> Option<Vec<Arc<dyn Record>>> {
        self.record("orders_get");
        *self.seen_query.lock() = Some(filter.clone());
        Self::records_of(&self.orders)
    }

    fn history_orders_total(&self, date_from: i64, date_to: i64) -> Option<i64> {
        self.record(&format!("history_orders_total({date_from},{date_to})"));
        self.history_orders.as_ref().map(|h| h.len() as i64)
    }

    fn history_orders_get(
        &self,
        range: Option<(i64, i64)>,
        filter: &HistoryFilter,
    ) -> Option<Vec<Arc<dyn Record>>> {
        self.record("history_orders_get");
        *self.seen_history.lock() = Some((range, filter.clone()));
        Self::records_of(&self.history_orders)
    }

    fn history_deals_total(&self, date_from: i64, date_to: i64) -> Option<i64> {
        self.record(&format!("history_deals_total({date_from},{date_to})"));
        self.history_deals.as_ref().map(|h| h.len() as i64)
    }

    fn history_deals_get(
        &self,
        range: Option<(i64, i64)>,
        filter: &HistoryFilter,
    ) -> Option<Vec<Arc<dyn Record>>> {
        self.record("history_deals_get");
        *self.seen_history.lock() = Some((range, filter.clone()));
        Self::records_of(&self.history_deals)
    }

    fn market_book_add(&self, _symbol: &str) -> bool {
        self.record("market_book_add");
        self.book_result
    }

    fn market_book_get(&self, _symbol: &str) -> Option<Vec<Arc<dyn Record>>> {
        self.record("market_book_get");
        Self::records_of(&self.book)
    }

    fn market_book_release(&self, _symbol: &str) -> bool {
        self.record("market_book_release");
        self.book_result
    }

    fn constant(&self, name: &str) -> Option<i64> {
        self.constants.get(name).copied()
    }
}
