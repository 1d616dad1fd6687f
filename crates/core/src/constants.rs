//! Named-constant catalogue
//!
//! Clients need the terminal's integer constants (timeframes, order
//! types, return codes, ...) to build requests. The catalogue below is
//! the fixed, versioned list of names to probe against whatever the
//! loaded module actually defines: unknown names are skipped, and a
//! category that yields no matches at all is logged so drift between
//! catalogue and module version is visible rather than silent.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::module::TerminalModule;

pub struct ConstantCategory {
    pub name: &'static str,
    pub members: &'static [&'static str],
}

pub const CATALOGUE: &[ConstantCategory] = &[
    ConstantCategory {
        name: "timeframes",
        members: &[
            "TIMEFRAME_M1", "TIMEFRAME_M2", "TIMEFRAME_M3", "TIMEFRAME_M4",
            "TIMEFRAME_M5", "TIMEFRAME_M6", "TIMEFRAME_M10", "TIMEFRAME_M12",
            "TIMEFRAME_M15", "TIMEFRAME_M20", "TIMEFRAME_M30", "TIMEFRAME_H1",
            "TIMEFRAME_H2", "TIMEFRAME_H3", "TIMEFRAME_H4", "TIMEFRAME_H6",
            "TIMEFRAME_H8", "TIMEFRAME_H12", "TIMEFRAME_D1", "TIMEFRAME_W1",
            "TIMEFRAME_MN1",
        ],
    },
    ConstantCategory {
        name: "order types",
        members: &[
            "ORDER_TYPE_BUY", "ORDER_TYPE_SELL", "ORDER_TYPE_BUY_LIMIT",
            "ORDER_TYPE_SELL_LIMIT", "ORDER_TYPE_BUY_STOP", "ORDER_TYPE_SELL_STOP",
            "ORDER_TYPE_BUY_STOP_LIMIT", "ORDER_TYPE_SELL_STOP_LIMIT",
            "ORDER_TYPE_CLOSE_BY",
        ],
    },
    ConstantCategory {
        name: "trade actions",
        members: &[
            "TRADE_ACTION_DEAL", "TRADE_ACTION_PENDING", "TRADE_ACTION_SLTP",
            "TRADE_ACTION_MODIFY", "TRADE_ACTION_REMOVE", "TRADE_ACTION_CLOSE_BY",
        ],
    },
    ConstantCategory {
        name: "order filling modes",
        members: &[
            "ORDER_FILLING_FOK", "ORDER_FILLING_IOC", "ORDER_FILLING_RETURN",
            "ORDER_FILLING_BOC",
        ],
    },
    ConstantCategory {
        name: "order time types",
        members: &[
            "ORDER_TIME_GTC", "ORDER_TIME_DAY", "ORDER_TIME_SPECIFIED",
            "ORDER_TIME_SPECIFIED_DAY",
        ],
    },
    ConstantCategory {
        name: "order states",
        members: &[
            "ORDER_STATE_STARTED", "ORDER_STATE_PLACED", "ORDER_STATE_CANCELED",
            "ORDER_STATE_PARTIAL", "ORDER_STATE_FILLED", "ORDER_STATE_REJECTED",
            "ORDER_STATE_EXPIRED", "ORDER_STATE_REQUEST_ADD",
            "ORDER_STATE_REQUEST_MODIFY", "ORDER_STATE_REQUEST_CANCEL",
        ],
    },
    ConstantCategory {
        name: "position types",
        members: &["POSITION_TYPE_BUY", "POSITION_TYPE_SELL"],
    },
    ConstantCategory {
        name: "position reasons",
        members: &[
            "POSITION_REASON_CLIENT", "POSITION_REASON_MOBILE",
            "POSITION_REASON_WEB", "POSITION_REASON_EXPERT",
        ],
    },
    ConstantCategory {
        name: "deal types",
        members: &[
            "DEAL_TYPE_BUY", "DEAL_TYPE_SELL", "DEAL_TYPE_BALANCE",
            "DEAL_TYPE_CREDIT", "DEAL_TYPE_CHARGE", "DEAL_TYPE_CORRECTION",
            "DEAL_TYPE_BONUS", "DEAL_TYPE_COMMISSION", "DEAL_TYPE_COMMISSION_DAILY",
            "DEAL_TYPE_COMMISSION_MONTHLY", "DEAL_TYPE_COMMISSION_AGENT_DAILY",
            "DEAL_TYPE_COMMISSION_AGENT_MONTHLY", "DEAL_TYPE_INTEREST",
            "DEAL_TYPE_BUY_CANCELED", "DEAL_TYPE_SELL_CANCELED",
            "DEAL_DIVIDEND", "DEAL_DIVIDEND_FRANKED", "DEAL_TAX",
        ],
    },
    ConstantCategory {
        name: "deal entries",
        members: &[
            "DEAL_ENTRY_IN", "DEAL_ENTRY_OUT", "DEAL_ENTRY_INOUT",
            "DEAL_ENTRY_OUT_BY",
        ],
    },
    ConstantCategory {
        name: "deal reasons",
        members: &[
            "DEAL_REASON_CLIENT", "DEAL_REASON_MOBILE", "DEAL_REASON_WEB",
            "DEAL_REASON_EXPERT", "DEAL_REASON_SL", "DEAL_REASON_TP",
            "DEAL_REASON_SO", "DEAL_REASON_ROLLOVER", "DEAL_REASON_VMARGIN",
            "DEAL_REASON_SPLIT",
        ],
    },
    ConstantCategory {
        name: "tick copy flags",
        members: &["COPY_TICKS_ALL", "COPY_TICKS_INFO", "COPY_TICKS_TRADE"],
    },
    ConstantCategory {
        name: "book types",
        members: &[
            "BOOK_TYPE_SELL", "BOOK_TYPE_BUY",
            "BOOK_TYPE_SELL_MARKET", "BOOK_TYPE_BUY_MARKET",
        ],
    },
    ConstantCategory {
        name: "symbol trade modes",
        members: &[
            "SYMBOL_TRADE_MODE_DISABLED", "SYMBOL_TRADE_MODE_LONGONLY",
            "SYMBOL_TRADE_MODE_SHORTONLY", "SYMBOL_TRADE_MODE_CLOSEONLY",
            "SYMBOL_TRADE_MODE_FULL",
        ],
    },
    ConstantCategory {
        name: "account trade modes",
        members: &[
            "ACCOUNT_TRADE_MODE_DEMO", "ACCOUNT_TRADE_MODE_CONTEST",
            "ACCOUNT_TRADE_MODE_REAL",
        ],
    },
    ConstantCategory {
        name: "trade return codes",
        members: &[
            "TRADE_RETCODE_REQUOTE", "TRADE_RETCODE_REJECT",
            "TRADE_RETCODE_CANCEL", "TRADE_RETCODE_PLACED",
            "TRADE_RETCODE_DONE", "TRADE_RETCODE_DONE_PARTIAL",
            "TRADE_RETCODE_ERROR", "TRADE_RETCODE_TIMEOUT",
            "TRADE_RETCODE_INVALID", "TRADE_RETCODE_INVALID_VOLUME",
            "TRADE_RETCODE_INVALID_PRICE", "TRADE_RETCODE_INVALID_STOPS",
            "TRADE_RETCODE_TRADE_DISABLED", "TRADE_RETCODE_MARKET_CLOSED",
            "TRADE_RETCODE_NO_MONEY", "TRADE_RETCODE_PRICE_CHANGED",
            "TRADE_RETCODE_PRICE_OFF", "TRADE_RETCODE_INVALID_EXPIRATION",
            "TRADE_RETCODE_ORDER_CHANGED", "TRADE_RETCODE_TOO_MANY_REQUESTS",
            "TRADE_RETCODE_NO_CHANGES", "TRADE_RETCODE_LOCKED",
            "TRADE_RETCODE_FROZEN", "TRADE_RETCODE_INVALID_FILL",
            "TRADE_RETCODE_CONNECTION", "TRADE_RETCODE_ONLY_REAL",
            "TRADE_RETCODE_LIMIT_ORDERS", "TRADE_RETCODE_LIMIT_VOLUME",
        ],
    },
];

/// Assemble the full constants table by probing the catalogue against
/// the loaded module. Only integer-valued hits are included.
pub fn collect(module: &dyn TerminalModule) -> BTreeMap<String, i64> {
    let mut table = BTreeMap::new();
    for category in CATALOGUE {
        let mut hits = 0usize;
        for name in category.members {
            if let Some(value) = module.constant(name) {
                table.insert((*name).to_string(), value);
                hits += 1;
            }
        }
        if hits == 0 {
            warn!(
                "constant category '{}' yielded no matches; module version drift?",
                category.name
            );
        }
    }
    debug!("collected {} constants", table.len());
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModule;

    #[test]
    fn collects_only_defined_names() {
        let module = MockModule::with_standard_constants();
        let table = collect(&module);

        assert!(table.len() >= 50);
        assert!(table.contains_key("ORDER_TYPE_BUY"));
        assert!(table.contains_key("ORDER_TYPE_SELL"));
        assert!(table.contains_key("TIMEFRAME_M1"));
        assert!(table.contains_key("TRADE_ACTION_DEAL"));
        // Unknown names are skipped, not invented.
        assert!(!table.contains_key("TIMEFRAME_M7"));
    }

    #[test]
    fn empty_module_yields_empty_table() {
        let module = MockModule::default();
        assert!(collect(&module).is_empty());
    }

    #[test]
    fn catalogue_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for category in CATALOGUE {
            for name in category.members {
                assert!(seen.insert(*name), "duplicate catalogue entry {name}");
            }
        }
        assert!(seen.len() >= 50);
    }
}
