//! Battery-management values.

use crate::host::Host;
use crate::marshal::{argc, argc_in, get_index, get_symbol, ExtResult};
use crate::registry::NativeFn;
use crate::symbol::Keyword;
use crate::value::{Sentinel, Value};

pub const EXTENSIONS: &[(&str, NativeFn)] = &[("get-bms-val", get_bms_val)];

/// `(get-bms-val field [index])`
///
/// Per-cell and per-sensor fields take a second argument, checked against the
/// current cell or sensor count.
fn get_bms_val(host: &Host, args: &[Value]) -> ExtResult {
    argc_in(args, 1..=2)?;
    let id = get_symbol(args, 0)?;
    let field = host.classify(Keyword::BMS, id).ok_or(Sentinel::Eval)?;
    let val = host.hw().bms_values();

    let indexed = |bound: usize| -> Result<usize, Sentinel> {
        argc(args, 2)?;
        get_index(args, 1, bound)
    };

    let f = Value::Float;
    Ok(match field {
        Keyword::BmsVTot => f(val.v_tot),
        Keyword::BmsVCharge => f(val.v_charge),
        Keyword::BmsIIn => f(val.i_in),
        Keyword::BmsIInIc => f(val.i_in_ic),
        Keyword::BmsAhCnt => f(val.ah_cnt),
        Keyword::BmsWhCnt => f(val.wh_cnt),
        Keyword::BmsCellNum => Value::int(val.v_cell.len() as i64),
        Keyword::BmsVCell => f(val.v_cell[indexed(val.v_cell.len())?]),
        Keyword::BmsBalState => {
            let c = indexed(val.v_cell.len())?;
            Value::Int(val.bal_state.get(c).copied().unwrap_or(false) as i32)
        }
        Keyword::BmsTempAdcNum => Value::int(val.temps_adc.len() as i64),
        Keyword::BmsTempsAdc => f(val.temps_adc[indexed(val.temps_adc.len())?]),
        Keyword::BmsTempIc => f(val.temp_ic),
        Keyword::BmsTempHum => f(val.temp_hum),
        Keyword::BmsHum => f(val.hum),
        Keyword::BmsTempCellMax => f(val.temp_max_cell),
        Keyword::BmsSoc => f(val.soc),
        Keyword::BmsSoh => f(val.soh),
        Keyword::BmsCanId => Value::int(i64::from(val.can_id)),
        Keyword::BmsAhCntChgTotal => f(val.ah_cnt_chg_total),
        Keyword::BmsWhCntChgTotal => f(val.wh_cnt_chg_total),
        Keyword::BmsAhCntDisTotal => f(val.ah_cnt_dis_total),
        Keyword::BmsWhCntDisTotal => f(val.wh_cnt_dis_total),
        Keyword::BmsMsgAge => f(val.msg_age),
        _ => return Err(Sentinel::Eval),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
