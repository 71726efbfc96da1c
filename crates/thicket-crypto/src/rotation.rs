//! Sliding-window rotation of transport keys
//!
//! Each bundle holds three incoming windows (previous, current, next) and
//! one outgoing window. Advancing the global period slides the window:
//!
//! ```text
//! period p:    [p-1] [p] [p+1]   out[p]
//! period p+1:        [p] [p+1] [p+2]   out[p+1]
//!                     ▲    ▲     ▲        ▲
//!                   reused reused derived derived
//! ```

use crate::{
    keys::{RotationPeriod, TransportKeys},
    schedule::{derive_window, keys_from_bases},
};

/// Rotate a bundle forward to `new_period`.
///
/// - `new_period <= keys.period()`: returns `keys` unchanged
/// - one period ahead: reuses the current and next incoming windows and
///   derives only the new next-incoming and outgoing windows
/// - two or more periods ahead: derives every window directly, matching
///   what repeated single-step rotation would produce
///
/// The consumed bundle's unreused windows are zeroized when dropped here.
pub fn rotate(keys: TransportKeys, new_period: RotationPeriod) -> TransportKeys {
    match keys.period.periods_until(new_period) {
        None => keys,
        Some(1) => shift_one(keys, new_period),
        Some(_) => {
            let TransportKeys { transport_id, incoming_base, outgoing_base, .. } = keys;
            keys_from_bases(transport_id, incoming_base, outgoing_base, new_period)
        },
    }
}

fn shift_one(keys: TransportKeys, new_period: RotationPeriod) -> TransportKeys {
    let TransportKeys {
        transport_id,
        current_incoming,
        next_incoming,
        incoming_base,
        outgoing_base,
        ..
    } = keys;

    debug_assert_eq!(next_incoming.period, new_period);

    TransportKeys {
        transport_id,
        period: new_period,
        next_incoming: derive_window(&incoming_base, new_period.next()),
        current_outgoing: derive_window(&outgoing_base, new_period),
        previous_incoming: current_incoming,
        current_incoming: next_incoming,
        incoming_base,
        outgoing_base,
    }
}
