//! Small validation helpers shared by the network adapters.

/// Printable ASCII only (`0x20..=0x7E`). SSIDs outside this range are
/// refused rather than passed to the driver.
pub(super) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Drop WebSocket senders whose flag says the peer has gone, keeping
/// order. Returns how many were removed.
pub(super) fn prune<T>(items: &mut Vec<T>, is_dead: impl Fn(&T) -> bool) -> usize {
    let before = items.len();
    items.retain(|item| !is_dead(item));
    before - items.len()
}
