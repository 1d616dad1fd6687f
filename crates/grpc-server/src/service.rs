//! The bridge's RPC surface
//!
//! One method per native capability. Every method follows the same
//! shape: validate inputs, obtain the module handle (loading it on
//! first use), delegate, marshal. The only error a method raises is
//! `UNAVAILABLE` when the native module cannot be loaded; a terminal
//! that answers "no data" produces the response type's empty value
//! instead, and callers distinguish the two by gRPC status alone.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{debug, info};

use mt5_bridge_core::constants;
use mt5_bridge_core::marshal::{
    chunk_wire_text, materialize_sequence, materialize_single, wire_text_items,
    wire_text_opt, SYMBOL_CHUNK_SIZE,
};
use mt5_bridge_core::validate::{validate_count, validate_date_range, validate_symbol};
use mt5_bridge_core::{
    field, BridgeError, HistoryFilter, InitParams, ModuleLoader, OrderFields,
    QueryFilter, TerminalModule,
};

use crate::conversions::series_to_proto;
use crate::proto;
use crate::proto::mt5_bridge_server::Mt5Bridge;

pub struct Mt5BridgeService {
    loader: Arc<ModuleLoader>,
}

impl Mt5BridgeService {
    pub fn new(loader: ModuleLoader) -> Self {
        Self {
            loader: Arc::new(loader),
        }
    }

    /// The module handle, loading it on first use. An unloadable module
    /// is the one condition reported as an RPC error.
    fn module(&self) -> Result<Arc<dyn TerminalModule>, Status> {
        self.loader
            .ensure_loaded()
            .map_err(|e| Status::unavailable(e.to_string()))
    }

    fn order_fields(json_request: &str, func: &str) -> Result<OrderFields, Status> {
        serde_json::from_str(json_request)
            .map_err(|e| BridgeError::InvalidOrderRequest(format!("{func}: {e}")))
            .map_err(|e| Status::invalid_argument(e.to_string()))
    }
}

fn text_filter(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn ticket_filter(value: Option<i64>) -> Option<i64> {
    value.filter(|t| *t != 0)
}

#[tonic::async_trait]
impl Mt5Bridge for Mt5BridgeService {
    async fn initialize(
        &self,
        request: Request<proto::InitRequest>,
    ) -> Result<Response<proto::BoolResponse>, Status> {
        let req = request.into_inner();
        let params = InitParams {
            path: req.path,
            login: req.login,
            password: req.password,
            server: req.server,
            timeout: req.timeout,
            portable: req.portable,
        };
        debug!("initialize: {} parameters supplied", params.supplied());

        let module = self.module()?;
        let result = module.initialize(&params);
        info!("initialize: result={result}");
        Ok(Response::new(proto::BoolResponse { result }))
    }

    async fn login(
        &self,
        request: Request<proto::LoginRequest>,
    ) -> Result<Response<proto::BoolResponse>, Status> {
        let req = request.into_inner();
        let module = self.module()?;
        let result = module.login(req.login, &req.password, &req.server, req.timeout);
        info!("login: account={} result={result}", req.login);
        Ok(Response::new(proto::BoolResponse { result }))
    }

    async fn shutdown(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::Empty>, Status> {
        let module = self.module()?;
        module.shutdown();
        info!("shutdown: terminal connection closed");
        Ok(Response::new(proto::Empty {}))
    }

    /// Never errors: an unloadable module is itself a health answer.
    async fn health_check(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::HealthStatus>, Status> {
        let module = match self.loader.loaded() {
            Some(module) => module,
            None => match self.loader.ensure_loaded() {
                Ok(module) => module,
                Err(e) => {
                    return Ok(Response::new(proto::HealthStatus {
                        reason: e.to_string(),
                        ..Default::default()
                    }));
                }
            },
        };

        let info = match materialize_single(module.terminal_info(), "health_check", &[]) {
            Some(info) => info,
            None => {
                return Ok(Response::new(proto::HealthStatus {
                    mt5_available: true,
                    reason: "terminal info unavailable".to_string(),
                    ..Default::default()
                }));
            }
        };

        let connected = field(&info, "connected")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let trade_allowed = field(&info, "trade_allowed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let build = field(&info, "build").and_then(|v| v.as_i64()).unwrap_or(0);

        let reason = if !connected {
            "terminal not connected"
        } else if !trade_allowed {
            "trading not allowed in terminal"
        } else {
            ""
        };
        Ok(Response::new(proto::HealthStatus {
            healthy: connected && trade_allowed,
            mt5_available: true,
            connected,
            trade_allowed,
            build,
            reason: reason.to_string(),
        }))
    }

    async fn version(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::TerminalVersion>, Status> {
        let module = self.module()?;
        let response = match module.version() {
            Some((major, minor, build)) => proto::TerminalVersion { major, minor, build },
            None => proto::TerminalVersion::default(),
        };
        Ok(Response::new(response))
    }

    async fn last_error(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::ErrorInfo>, Status> {
        let module = self.module()?;
        let (code, message) = module.last_error();
        Ok(Response::new(proto::ErrorInfo { code, message }))
    }

    async fn get_constants(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::Constants>, Status> {
        let module = self.module()?;
        let values = constants::collect(module.as_ref());
        info!("get_constants: {} names resolved", values.len());
        Ok(Response::new(proto::Constants {
            values: values.into_iter().collect(),
        }))
    }

    async fn terminal_info(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::DictData>, Status> {
        let module = self.module()?;
        let map = materialize_single(module.terminal_info(), "terminal_info", &[]);
        Ok(Response::new(proto::DictData {
            json_data: wire_text_opt(map.as_ref()),
        }))
    }

    async fn account_info(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::DictData>, Status> {
        let module = self.module()?;
        let map = materialize_single(module.account_info(), "account_info", &[]);
        Ok(Response::new(proto::DictData {
            json_data: wire_text_opt(map.as_ref()),
        }))
    }

    async fn symbols_total(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::IntResponse>, Status> {
        let module = self.module()?;
        let value = module.symbols_total().unwrap_or(0);
        Ok(Response::new(proto::IntResponse { value }))
    }

    async fn symbols_get(
        &self,
        request: Request<proto::SymbolsRequest>,
    ) -> Result<Response<proto::SymbolsResponse>, Status> {
        let group = text_filter(request.into_inner().group);
        let module = self.module()?;

        let items = match materialize_sequence(module.symbols_get(group.as_deref()), "symbols_get")
        {
            Some(items) => items,
            None => return Ok(Response::new(proto::SymbolsResponse::default())),
        };

        let chunks = chunk_wire_text(&items, SYMBOL_CHUNK_SIZE);
        debug!(
            "symbols_get: {} symbols in {} chunks (group={group:?})",
            items.len(),
            chunks.len()
        );
        Ok(Response::new(proto::SymbolsResponse {
            total: items.len() as i64,
            chunks,
        }))
    }

    async fn symbol_info(
        &self,
        request: Request<proto::SymbolRequest>,
    ) -> Result<Response<proto::DictData>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "symbol_info") {
            return Ok(Response::new(proto::DictData::default()));
        }
        let module = self.module()?;
        let map = materialize_single(module.symbol_info(&req.symbol), "symbol_info", &[]);
        Ok(Response::new(proto::DictData {
            json_data: wire_text_opt(map.as_ref()),
        }))
    }

    async fn symbol_info_tick(
        &self,
        request: Request<proto::SymbolRequest>,
    ) -> Result<Response<proto::DictData>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "symbol_info_tick") {
            return Ok(Response::new(proto::DictData::default()));
        }
        let module = self.module()?;
        let map = materialize_single(module.symbol_info_tick(&req.symbol), "symbol_info_tick", &[]);
        Ok(Response::new(proto::DictData {
            json_data: wire_text_opt(map.as_ref()),
        }))
    }

    async fn symbol_select(
        &self,
        request: Request<proto::SymbolSelectRequest>,
    ) -> Result<Response<proto::BoolResponse>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "symbol_select") {
            return Ok(Response::new(proto::BoolResponse { result: false }));
        }
        let module = self.module()?;
        let result = module.symbol_select(&req.symbol, req.enable);
        Ok(Response::new(proto::BoolResponse { result }))
    }

    async fn copy_rates_from(
        &self,
        request: Request<proto::CopyRatesRequest>,
    ) -> Result<Response<proto::NumericArray>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "copy_rates_from")
            || !validate_count(req.count, "copy_rates_from")
        {
            return Ok(Response::new(series_to_proto(None)));
        }
        let module = self.module()?;
        let series =
            module.copy_rates_from(&req.symbol, req.timeframe, req.date_from, req.count);
        Ok(Response::new(series_to_proto(series)))
    }

    async fn copy_rates_from_pos(
        &self,
        request: Request<proto::CopyRatesPosRequest>,
    ) -> Result<Response<proto::NumericArray>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "copy_rates_from_pos")
            || !validate_count(req.count, "copy_rates_from_pos")
        {
            return Ok(Response::new(series_to_proto(None)));
        }
        let module = self.module()?;
        let series =
            module.copy_rates_from_pos(&req.symbol, req.timeframe, req.start_pos, req.count);
        Ok(Response::new(series_to_proto(series)))
    }

    async fn copy_rates_range(
        &self,
        request: Request<proto::CopyRatesRangeRequest>,
    ) -> Result<Response<proto::NumericArray>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "copy_rates_range")
            || !validate_date_range(req.date_from, req.date_to, "copy_rates_range")
        {
            return Ok(Response::new(series_to_proto(None)));
        }
        let module = self.module()?;
        let series =
            module.copy_rates_range(&req.symbol, req.timeframe, req.date_from, req.date_to);
        Ok(Response::new(series_to_proto(series)))
    }

    async fn copy_ticks_from(
        &self,
        request: Request<proto::CopyTicksRequest>,
    ) -> Result<Response<proto::NumericArray>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "copy_ticks_from")
            || !validate_count(req.count, "copy_ticks_from")
        {
            return Ok(Response::new(series_to_proto(None)));
        }
        let module = self.module()?;
        let series = module.copy_ticks_from(&req.symbol, req.date_from, req.count, req.flags);
        Ok(Response::new(series_to_proto(series)))
    }

    async fn copy_ticks_range(
        &self,
        request: Request<proto::CopyTicksRangeRequest>,
    ) -> Result<Response<proto::NumericArray>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "copy_ticks_range")
            || !validate_date_range(req.date_from, req.date_to, "copy_ticks_range")
        {
            return Ok(Response::new(series_to_proto(None)));
        }
        let module = self.module()?;
        let series = module.copy_ticks_range(&req.symbol, req.date_from, req.date_to, req.flags);
        Ok(Response::new(series_to_proto(series)))
    }

    async fn order_calc_margin(
        &self,
        request: Request<proto::MarginRequest>,
    ) -> Result<Response<proto::FloatResponse>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "order_calc_margin") {
            return Ok(Response::new(proto::FloatResponse::default()));
        }
        let module = self.module()?;
        let value = module
            .order_calc_margin(req.action, &req.symbol, req.volume, req.price)
            .unwrap_or(0.0);
        Ok(Response::new(proto::FloatResponse { value }))
    }

    async fn order_calc_profit(
        &self,
        request: Request<proto::ProfitRequest>,
    ) -> Result<Response<proto::FloatResponse>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "order_calc_profit") {
            return Ok(Response::new(proto::FloatResponse::default()));
        }
        let module = self.module()?;
        let value = module
            .order_calc_profit(
                req.action,
                &req.symbol,
                req.volume,
                req.price_open,
                req.price_close,
            )
            .unwrap_or(0.0);
        Ok(Response::new(proto::FloatResponse { value }))
    }

    async fn order_check(
        &self,
        request: Request<proto::OrderRequest>,
    ) -> Result<Response<proto::DictData>, Status> {
        let req = request.into_inner();
        let fields = Self::order_fields(&req.json_request, "order_check")?;
        let module = self.module()?;
        let map = materialize_single(module.order_check(&fields), "order_check", &["request"]);
        Ok(Response::new(proto::DictData {
            json_data: wire_text_opt(map.as_ref()),
        }))
    }

    async fn order_send(
        &self,
        request: Request<proto::OrderRequest>,
    ) -> Result<Response<proto::DictData>, Status> {
        let req = request.into_inner();
        let fields = Self::order_fields(&req.json_request, "order_send")?;
        let module = self.module()?;
        let map = materialize_single(module.order_send(&fields), "order_send", &["request"]);
        info!("order_send: result={}", if map.is_some() { "ok" } else { "none" });
        Ok(Response::new(proto::DictData {
            json_data: wire_text_opt(map.as_ref()),
        }))
    }

    async fn positions_total(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::IntResponse>, Status> {
        let module = self.module()?;
        let value = module.positions_total().unwrap_or(0);
        Ok(Response::new(proto::IntResponse { value }))
    }

    async fn positions_get(
        &self,
        request: Request<proto::PositionsRequest>,
    ) -> Result<Response<proto::DictList>, Status> {
        let req = request.into_inner();
        let filter = QueryFilter {
            symbol: text_filter(req.symbol),
            group: text_filter(req.group),
            ticket: ticket_filter(req.ticket),
        };
        let module = self.module()?;
        let items = materialize_sequence(module.positions_get(&filter), "positions_get")
            .unwrap_or_default();
        Ok(Response::new(proto::DictList {
            json_items: wire_text_items(&items),
        }))
    }

    async fn orders_total(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::IntResponse>, Status> {
        let module = self.module()?;
        let value = module.orders_total().unwrap_or(0);
        Ok(Response::new(proto::IntResponse { value }))
    }

    async fn orders_get(
        &self,
        request: Request<proto::OrdersRequest>,
    ) -> Result<Response<proto::DictList>, Status> {
        let req = request.into_inner();
        let filter = QueryFilter {
            symbol: text_filter(req.symbol),
            group: text_filter(req.group),
            ticket: ticket_filter(req.ticket),
        };
        let module = self.module()?;
        let items =
            materialize_sequence(module.orders_get(&filter), "orders_get").unwrap_or_default();
        Ok(Response::new(proto::DictList {
            json_items: wire_text_items(&items),
        }))
    }

    async fn history_orders_total(
        &self,
        request: Request<proto::HistoryRequest>,
    ) -> Result<Response<proto::IntResponse>, Status> {
        let req = request.into_inner();
        let from = req.date_from.unwrap_or(0);
        let to = req.date_to.unwrap_or(0);
        if !validate_date_range(from, to, "history_orders_total") {
            return Ok(Response::new(proto::IntResponse::default()));
        }
        let module = self.module()?;
        let value = module.history_orders_total(from, to).unwrap_or(0);
        Ok(Response::new(proto::IntResponse { value }))
    }

    async fn history_orders_get(
        &self,
        request: Request<proto::HistoryRequest>,
    ) -> Result<Response<proto::DictList>, Status> {
        let req = request.into_inner();
        let range = req.date_from.zip(req.date_to);
        if let Some((from, to)) = range {
            if !validate_date_range(from, to, "history_orders_get") {
                return Ok(Response::new(proto::DictList::default()));
            }
        }
        let filter = HistoryFilter {
            group: text_filter(req.group),
            ticket: ticket_filter(req.ticket),
            position: ticket_filter(req.position),
        };
        let module = self.module()?;
        let items = materialize_sequence(
            module.history_orders_get(range, &filter),
            "history_orders_get",
        )
        .unwrap_or_default();
        Ok(Response::new(proto::DictList {
            json_items: wire_text_items(&items),
        }))
    }

    async fn history_deals_total(
        &self,
        request: Request<proto::HistoryRequest>,
    ) -> Result<Response<proto::IntResponse>, Status> {
        let req = request.into_inner();
        let from = req.date_from.unwrap_or(0);
        let to = req.date_to.unwrap_or(0);
        if !validate_date_range(from, to, "history_deals_total") {
            return Ok(Response::new(proto::IntResponse::default()));
        }
        let module = self.module()?;
        let value = module.history_deals_total(from, to).unwrap_or(0);
        Ok(Response::new(proto::IntResponse { value }))
    }

    async fn history_deals_get(
        &self,
        request: Request<proto::HistoryRequest>,
    ) -> Result<Response<proto::DictList>, Status> {
        let req = request.into_inner();
        let range = req.date_from.zip(req.date_to);
        if let Some((from, to)) = range {
            if !validate_date_range(from, to, "history_deals_get") {
                return Ok(Response::new(proto::DictList::default()));
            }
        }
        let filter = HistoryFilter {
            group: text_filter(req.group),
            ticket: ticket_filter(req.ticket),
            position: ticket_filter(req.position),
        };
        let module = self.module()?;
        let items = materialize_sequence(
            module.history_deals_get(range, &filter),
            "history_deals_get",
        )
        .unwrap_or_default();
        Ok(Response::new(proto::DictList {
            json_items: wire_text_items(&items),
        }))
    }

    async fn market_book_add(
        &self,
        request: Request<proto::SymbolRequest>,
    ) -> Result<Response<proto::BoolResponse>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "market_book_add") {
            return Ok(Response::new(proto::BoolResponse { result: false }));
        }
        let module = self.module()?;
        let result = module.market_book_add(&req.symbol);
        Ok(Response::new(proto::BoolResponse { result }))
    }

    async fn market_book_get(
        &self,
        request: Request<proto::SymbolRequest>,
    ) -> Result<Response<proto::DictList>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "market_book_get") {
            return Ok(Response::new(proto::DictList::default()));
        }
        let module = self.module()?;
        let items = materialize_sequence(module.market_book_get(&req.symbol), "market_book_get")
            .unwrap_or_default();
        Ok(Response::new(proto::DictList {
            json_items: wire_text_items(&items),
        }))
    }

    async fn market_book_release(
        &self,
        request: Request<proto::SymbolRequest>,
    ) -> Result<Response<proto::BoolResponse>, Status> {
        let req = request.into_inner();
        if !validate_symbol(&req.symbol, "market_book_release") {
            return Ok(Response::new(proto::BoolResponse { result: false }));
        }
        let module = self.module()?;
        let result = module.market_book_release(&req.symbol);
        Ok(Response::new(proto::BoolResponse { result }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mt5_bridge_core::testing::{field_map, MockModule};
    use mt5_bridge_core::{FieldValue, NumericSeries};

    use super::*;

    fn service_with(module: MockModule) -> (Mt5BridgeService, Arc<MockModule>) {
        let module = Arc::new(module);
        let service = Mt5BridgeService::new(ModuleLoader::preloaded(Arc::clone(&module) as _));
        (service, module)
    }

    fn failing_service() -> Mt5BridgeService {
        Mt5BridgeService::new(ModuleLoader::new(Box::new(|| {
            Err(ModuleLoader::unavailable("terminal import failed"))
        })))
    }

    fn symbol_map(name: &str) -> mt5_bridge_core::FieldMap {
        field_map(&[("name", FieldValue::from(name))])
    }

    #[tokio::test]
    async fn unloadable_module_maps_to_unavailable() {
        let service = failing_service();
        let err = service
            .symbols_total(Request::new(proto::Empty {}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unavailable);
        assert!(err.message().contains("terminal import failed"));
    }

    #[tokio::test]
    async fn health_check_reports_unloadable_module_without_error() {
        let service = failing_service();
        let status = service
            .health_check(Request::new(proto::Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert!(!status.healthy);
        assert!(!status.mt5_available);
        assert!(status.reason.contains("terminal import failed"));
    }

    #[tokio::test]
    async fn health_check_degrades_when_terminal_info_is_absent() {
        let (service, _) = service_with(MockModule::default());
        let status = service
            .health_check(Request::new(proto::Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert!(!status.healthy);
        assert!(status.mt5_available);
        assert!(!status.connected);
        assert_eq!(status.reason, "terminal info unavailable");
    }

    #[tokio::test]
    async fn health_check_degrades_when_trading_is_disabled() {
        let mut module = MockModule::default();
        module.terminal_info = Some(field_map(&[
            ("connected", FieldValue::Bool(true)),
            ("trade_allowed", FieldValue::Bool(false)),
            ("build", FieldValue::Int(4620)),
        ]));
        let (service, _) = service_with(module);

        let status = service
            .health_check(Request::new(proto::Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert!(!status.healthy);
        assert!(status.connected);
        assert!(!status.trade_allowed);
        assert_eq!(status.build, 4620);
        assert_eq!(status.reason, "trading not allowed in terminal");
    }

    #[tokio::test]
    async fn health_check_reports_fully_healthy_terminal() {
        let mut module = MockModule::default();
        module.terminal_info = Some(field_map(&[
            ("connected", FieldValue::Bool(true)),
            ("trade_allowed", FieldValue::Bool(true)),
            ("build", FieldValue::Int(4620)),
        ]));
        let (service, _) = service_with(module);

        let status = service
            .health_check(Request::new(proto::Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert!(status.healthy);
        assert!(status.connected);
        assert!(status.trade_allowed);
        assert!(status.reason.is_empty());
    }

    #[tokio::test]
    async fn initialize_forwards_only_supplied_parameters() {
        let mut module = MockModule::default();
        module.init_result = true;
        let (service, module) = service_with(module);

        let request = proto::InitRequest {
            login: Some(12345),
            server: Some("Broker-Demo".to_string()),
            ..Default::default()
        };
        let reply = service
            .initialize(Request::new(request))
            .await
            .unwrap()
            .into_inner();
        assert!(reply.result);

        let seen = module.seen_init.lock().clone().unwrap();
        assert_eq!(seen.supplied(), 2);
        assert_eq!(seen.login, Some(12345));
        assert!(seen.path.is_none());
        assert!(seen.password.is_none());
    }

    #[tokio::test]
    async fn constants_cover_the_standard_catalogue() {
        let (service, _) = service_with(MockModule::with_standard_constants());
        let constants = service
            .get_constants(Request::new(proto::Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert!(constants.values.len() >= 50);
        assert_eq!(constants.values.get("ORDER_TYPE_BUY"), Some(&0));
        assert_eq!(constants.values.get("TRADE_RETCODE_DONE"), Some(&10009));
    }

    #[tokio::test]
    async fn empty_symbol_short_circuits_before_the_module() {
        let (service, module) = service_with(MockModule::default());
        let reply = service
            .symbol_info(Request::new(proto::SymbolRequest {
                symbol: "  ".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.json_data, "");
        assert!(module.calls().is_empty());
    }

    #[tokio::test]
    async fn inverted_date_range_short_circuits_before_the_module() {
        let (service, module) = service_with(MockModule::default());
        let reply = service
            .copy_rates_range(Request::new(proto::CopyRatesRangeRequest {
                symbol: "EURUSD".to_string(),
                timeframe: 15,
                date_from: 1_700_000_000,
                date_to: 1_600_000_000,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(reply.data.is_empty());
        assert!(reply.dtype.is_empty());
        assert!(module.calls().is_empty());
    }

    #[tokio::test]
    async fn copy_rates_returns_the_native_buffer() {
        let mut module = MockModule::default();
        module.series = Some(NumericSeries {
            data: vec![0u8; 48],
            dtype: "float64".to_string(),
            shape: vec![6],
        });
        let (service, module) = service_with(module);

        let reply = service
            .copy_rates_from(Request::new(proto::CopyRatesRequest {
                symbol: "EURUSD".to_string(),
                timeframe: 15,
                date_from: 1_600_000_000,
                count: 6,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.data.len(), 48);
        assert_eq!(reply.shape, vec![6]);
        assert!(module.called("copy_rates_from"));
    }

    #[tokio::test]
    async fn non_positive_count_yields_empty_buffer() {
        let (service, module) = service_with(MockModule::default());
        let reply = service
            .copy_ticks_from(Request::new(proto::CopyTicksRequest {
                symbol: "EURUSD".to_string(),
                date_from: 1_600_000_000,
                count: 0,
                flags: -1,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(reply.data.is_empty());
        assert!(module.calls().is_empty());
    }

    #[tokio::test]
    async fn symbols_get_chunks_large_enumerations() {
        let mut module = MockModule::default();
        module.symbols = Some((0..1200).map(|i| symbol_map(&format!("S{i}"))).collect());
        let (service, _) = service_with(module);

        let reply = service
            .symbols_get(Request::new(proto::SymbolsRequest { group: None }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.total, 1200);
        assert_eq!(reply.chunks.len(), 3);

        let sizes: Vec<usize> = reply
            .chunks
            .iter()
            .map(|c| {
                serde_json::from_str::<serde_json::Value>(c)
                    .unwrap()
                    .as_array()
                    .unwrap()
                    .len()
            })
            .collect();
        assert_eq!(sizes, vec![500, 500, 200]);
    }

    #[tokio::test]
    async fn symbols_get_blank_group_is_treated_as_no_filter() {
        let mut module = MockModule::default();
        module.symbols = Some(vec![symbol_map("EURUSD")]);
        let (service, module) = service_with(module);

        service
            .symbols_get(Request::new(proto::SymbolsRequest {
                group: Some(String::new()),
            }))
            .await
            .unwrap();
        assert!(module.called("symbols_get(group=None)"));
    }

    #[tokio::test]
    async fn symbols_get_without_data_is_empty_not_an_error() {
        let (service, _) = service_with(MockModule::default());
        let reply = service
            .symbols_get(Request::new(proto::SymbolsRequest { group: None }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.total, 0);
        assert!(reply.chunks.is_empty());
    }

    #[tokio::test]
    async fn order_send_embeds_the_request_in_the_result() {
        let mut module = MockModule::default();
        module.order_result = Some(field_map(&[("retcode", FieldValue::Int(10009))]));
        let (service, module) = service_with(module);

        let reply = service
            .order_send(Request::new(proto::OrderRequest {
                json_request: r#"{"action":1,"symbol":"EURUSD","volume":0.1}"#.to_string(),
            }))
            .await
            .unwrap()
            .into_inner();

        let json: serde_json::Value = serde_json::from_str(&reply.json_data).unwrap();
        assert_eq!(json["retcode"], 10009);
        assert_eq!(json["request"]["symbol"], "EURUSD");

        let seen = module.seen_order.lock().clone().unwrap();
        assert_eq!(seen.get("volume").and_then(|v| v.as_f64()), Some(0.1));
    }

    #[tokio::test]
    async fn malformed_order_request_is_invalid_argument() {
        let (service, module) = service_with(MockModule::default());
        let err = service
            .order_check(Request::new(proto::OrderRequest {
                json_request: "not json".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
        assert!(err.message().contains("invalid order request payload"));
        assert!(module.calls().is_empty());
    }

    #[tokio::test]
    async fn order_calc_margin_without_data_is_zero() {
        let (service, _) = service_with(MockModule::default());
        let reply = service
            .order_calc_margin(Request::new(proto::MarginRequest {
                action: 0,
                symbol: "EURUSD".to_string(),
                volume: 0.1,
                price: 1.1,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.value, 0.0);
    }

    #[tokio::test]
    async fn positions_filter_forwards_only_meaningful_values() {
        let mut module = MockModule::default();
        module.positions = Some(vec![symbol_map("EURUSD")]);
        let (service, module) = service_with(module);

        service
            .positions_get(Request::new(proto::PositionsRequest {
                symbol: Some("EURUSD".to_string()),
                group: Some(String::new()),
                ticket: Some(0),
            }))
            .await
            .unwrap();

        let seen = module.seen_query.lock().clone().unwrap();
        assert_eq!(seen.symbol.as_deref(), Some("EURUSD"));
        assert!(seen.group.is_none());
        assert!(seen.ticket.is_none());
    }

    #[tokio::test]
    async fn history_totals_default_the_missing_bounds() {
        let mut module = MockModule::default();
        module.history_orders = Some(vec![symbol_map("EURUSD")]);
        let (service, module) = service_with(module);

        let reply = service
            .history_orders_total(Request::new(proto::HistoryRequest::default()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.value, 1);
        assert!(module.called("history_orders_total(0,0)"));
    }

    #[tokio::test]
    async fn history_get_forwards_range_and_filter() {
        let mut module = MockModule::default();
        module.history_deals = Some(vec![symbol_map("EURUSD")]);
        let (service, module) = service_with(module);

        let reply = service
            .history_deals_get(Request::new(proto::HistoryRequest {
                date_from: Some(1_600_000_000),
                date_to: Some(1_700_000_000),
                group: Some("*USD*".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.json_items.len(), 1);

        let (range, filter) = module.seen_history.lock().clone().unwrap();
        assert_eq!(range, Some((1_600_000_000, 1_700_000_000)));
        assert_eq!(filter.group.as_deref(), Some("*USD*"));
        assert!(filter.ticket.is_none());
    }

    #[tokio::test]
    async fn history_get_with_one_bound_omits_the_range() {
        let mut module = MockModule::default();
        module.history_orders = Some(vec![]);
        let (service, module) = service_with(module);

        service
            .history_orders_get(Request::new(proto::HistoryRequest {
                date_from: Some(1_600_000_000),
                ticket: Some(42),
                ..Default::default()
            }))
            .await
            .unwrap();

        let (range, filter) = module.seen_history.lock().clone().unwrap();
        assert!(range.is_none());
        assert_eq!(filter.ticket, Some(42));
    }

    #[tokio::test]
    async fn absent_version_is_zeroed() {
        let (service, _) = service_with(MockModule::default());
        let reply = service
            .version(Request::new(proto::Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.major, 0);
        assert_eq!(reply.minor, 0);
        assert!(reply.build.is_empty());
    }

    #[tokio::test]
    async fn market_book_get_marshals_entries() {
        let mut module = MockModule::default();
        module.book = Some(vec![
            field_map(&[("type", FieldValue::Int(1)), ("price", FieldValue::Float(1.1))]),
            field_map(&[("type", FieldValue::Int(2)), ("price", FieldValue::Float(1.2))]),
        ]);
        let (service, _) = service_with(module);

        let reply = service
            .market_book_get(Request::new(proto::SymbolRequest {
                symbol: "EURUSD".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.json_items.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&reply.json_items[0]).unwrap();
        assert_eq!(first["price"], 1.1);
    }

    #[tokio::test]
    async fn market_book_release_rejects_blank_symbol() {
        let (service, module) = service_with(MockModule::default());
        let reply = service
            .market_book_release(Request::new(proto::SymbolRequest {
                symbol: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(!reply.result);
        assert!(module.calls().is_empty());
    }
}
