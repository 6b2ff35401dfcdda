use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct ProgressManager {
    mp: MultiProgress,
    bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Manager whose bars are never drawn (`--no-progress`, tests).
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            mp: MultiProgress::with_draw_target(target),
            bars: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a new bar
    /// - `id`: unique bar identifier
    /// - `total`: length of the bar
    /// - `template`: one of [`templates`]
    /// - `message`: initial message
    pub fn create_bar(
        &self,
        id: &str,
        total: u64,
        template: &str,
        message: &str,
    ) -> Result<(), String> {
        let mut bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;

        if bars.contains_key(id) {
            return Err(format!("Progress bar '{}' already exists", id));
        }

        let style = ProgressStyle::default_bar()
            .template(template)
            .map_err(|e| format!("Bad template: {}", e))?
            .progress_chars("█▉▊▋▌▍▎▏ ");

        let pb = self
            .mp
            .add(ProgressBar::new(total));
        pb.set_style(style);
        pb.set_message(message.to_string());

        bars.insert(id.to_string(), pb);
        Ok(())
    }

    pub fn inc(&self, id: &str, value: u64) -> Result<(), String> {
        self.with_bar(id, |pb| pb.inc(value))
    }

    /// Finish a bar and keep it on screen
    pub fn finish(&self, id: &str, message: &str) -> Result<(), String> {
        self.with_bar(id, |pb| pb.finish_with_message(message.to_string()))
    }

    /// Abandon all bars (run failed)
    pub fn clear_all(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, pb) in bars.drain() {
                pb.abandon();
            }
        }
    }

    fn with_bar<T>(&self, id: &str, f: impl FnOnce(&ProgressBar) -> T) -> Result<T, String> {
        let bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;
        bars.get(id)
            .map(f)
            .ok_or_else(|| format!("Progress bar '{}' not found", id))
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

pub mod templates {
    pub const MODEM: &str =
        "\u{f048a} MOD  [{bar:30.cyan}] {percent}% ({bytes}/{total_bytes}) {msg}";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_lifecycle() {
        let pm = ProgressManager::hidden();
        pm.create_bar("modem", 100, templates::MODEM, "input.bin").unwrap();
        assert!(pm.create_bar("modem", 100, templates::MODEM, "again").is_err());

        pm.inc("modem", 40).unwrap();
        pm.inc("modem", 2).unwrap();
        pm.finish("modem", "done").unwrap();

        assert!(pm.inc("missing", 1).is_err());
        assert!(pm.finish("missing", "done").is_err());

        pm.clear_all();
        assert!(pm.inc("modem", 1).is_err());
    }
}
