use std::time::Instant;
use tracing::info;

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "⏱  Finished: {} (took {:.2?})",
            self.label,
            self.start.elapsed()
        );
    }
}

/// Format a pump price the way the listings print it: decimal comma + kr.
pub fn fmt_kr(price: f64) -> String {
    format!("{:.2}", price).replace('.', ",") + " kr"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_kr() {
        assert_eq!(fmt_kr(15.49), "15,49 kr");
        assert_eq!(fmt_kr(15.5), "15,50 kr");
        assert_eq!(fmt_kr(0.0944), "0,09 kr");
    }
}
