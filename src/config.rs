use clap::{Parser, Subcommand};

/// Flowstate: per-possession NBA expected points (EPV) engine.
///
/// Builds tabular features from a raw play-by-play event log, trains a
/// memory-0 baseline model and a memory-3 sequence model, and surfaces the
/// possessions where the two disagree the most.
#[derive(Parser, Debug, Clone)]
#[command(name = "flowstate", version, about)]
pub struct Config {
    /// Directory holding raw_<game_id>.json and the generated feature CSVs
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: String,

    /// Directory holding trained model artifacts
    #[arg(long, env = "MODELS_DIR", default_value = "models")]
    pub models_dir: String,

    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// Gradient-descent epochs for model fitting
    #[arg(long, env = "TRAIN_EPOCHS", default_value = "400")]
    pub train_epochs: usize,

    /// Initial learning rate (decays over epochs)
    #[arg(long, env = "LEARNING_RATE", default_value = "0.2")]
    pub learning_rate: f64,

    /// L2 regularisation strength on the softmax weights
    #[arg(long, env = "L2_PENALTY", default_value = "0.001")]
    pub l2_penalty: f64,

    /// RNG seed for the train/test shuffle (reproducible evaluation)
    #[arg(long, env = "SEED", default_value = "42")]
    pub seed: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build baseline and sequence feature CSVs from raw_<game_id>.json
    Features {
        /// NBA game id (e.g. 0022400001)
        game_id: String,
    },
    /// Train both models, print a log-loss report, and save artifacts
    Train { game_id: String },
    /// Print per-possession EPV for one model
    Epv {
        game_id: String,
        /// Model tag: baseline or sequence
        #[arg(long, default_value = "sequence")]
        tag: String,
    },
    /// Print the top-N possessions by EPV swing between the two models
    Swing {
        game_id: String,
        #[arg(long, default_value = "20")]
        top_n: usize,
    },
    /// Serve the dashboard and JSON API
    Serve,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.train_epochs == 0 {
            anyhow::bail!("train_epochs must be at least 1");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 10.0) {
            anyhow::bail!("learning_rate must be in (0.0, 10.0]");
        }
        if !(0.0..=1.0).contains(&self.l2_penalty) {
            anyhow::bail!("l2_penalty must be between 0.0 and 1.0");
        }
        if let Command::Epv { tag, .. } = &self.command {
            if tag != "baseline" && tag != "sequence" {
                anyhow::bail!("tag must be 'baseline' or 'sequence', got '{tag}'");
            }
        }
        if let Command::Swing { top_n, .. } = &self.command {
            if *top_n == 0 {
                anyhow::bail!("top_n must be at least 1");
            }
        }
        Ok(())
    }

    /// Hyperparameters forwarded to every model fit.
    pub fn fit_params(&self) -> crate::model::FitParams {
        crate::model::FitParams {
            epochs: self.train_epochs,
            learning_rate: self.learning_rate,
            l2: self.l2_penalty,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(command: Command) -> Config {
        Config {
            data_dir: "data".into(),
            models_dir: "models".into(),
            dashboard_addr: "0.0.0.0:8080".into(),
            train_epochs: 400,
            learning_rate: 0.2,
            l2_penalty: 0.001,
            seed: 42,
            command,
        }
    }

    #[test]
    fn valid_defaults_pass() {
        let cfg = config_with(Command::Serve);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_model_tag() {
        let cfg = config_with(Command::Epv {
            game_id: "0022400001".into(),
            tag: "ensemble".into(),
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_top_n() {
        let cfg = config_with(Command::Swing {
            game_id: "0022400001".into(),
            top_n: 0,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_learning_rate() {
        let mut cfg = config_with(Command::Serve);
        cfg.learning_rate = 0.0;
        assert!(cfg.validate().is_err());
    }
}
