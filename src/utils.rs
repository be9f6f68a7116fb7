use std::time::{Duration, Instant};

pub(crate) fn trace(profile: bool, l_type: &str, l_step: &str, started: Instant, _elapsed: Duration) -> Duration {
    if profile {
        log::debug!("{} | Total={:.2?} | {}={:.2?}", l_type, started.elapsed(), l_step, started.elapsed() - _elapsed);
    }
    else {
        log::trace!("{} | Total={:.2?} | {}={:.2?}", l_type, started.elapsed(), l_step, started.elapsed() - _elapsed);
    }
    started.elapsed()
}

pub(crate) fn human_bytes(size: f64) -> String {
    let units = ["", "K", "M", "G", "T"];
    let mut size = size;
    let mut unit = 0;
    while size >= 1000.0 && unit < units.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }
    format!("{:.1}{}", size, units[unit])
}

pub(crate) fn make_divisible(x: usize, divisor: usize) -> usize {
    x.div_ceil(divisor) * divisor
}
