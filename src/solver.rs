//! External optimizer interchange.
//!
//! The two integer/linear programs (representative selection and attribute
//! rebalancing) are not solved in-crate. This module writes AMPL data files,
//! drives the `ampl` executable as a subprocess against the fixed model files
//! in `models/`, and parses the displayed variable values back out.

use crate::error::{ReplicationError, Result};
use crate::stats::CorrMatrix;
use crate::types::AttributeTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Model file implementing the cardinality-constrained selection MIP.
pub const SELECTION_MODEL: &str = "max_corr.mod";
/// Model file implementing the attribute-matching reallocation LP.
pub const REBALANCE_MODEL: &str = "attribute_match.mod";

/// External solver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// AMPL executable to spawn.
    pub ampl_cmd: String,
    /// Solver AMPL should hand the problem to.
    pub solver_name: String,
    /// Directory holding the fixed model files.
    pub model_dir: PathBuf,
    /// Scratch directory for generated data and run files. Files are
    /// overwritten between iterations.
    pub work_dir: PathBuf,
    /// Keep generated files after each solve instead of deleting them.
    pub keep_files: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            ampl_cmd: "ampl".to_string(),
            solver_name: "gurobi".to_string(),
            model_dir: PathBuf::from("models"),
            work_dir: PathBuf::from("solver_work"),
            keep_files: false,
        }
    }
}

/// Runs AMPL models against generated data files.
#[derive(Debug, Clone)]
pub struct AmplRunner {
    config: SolverConfig,
}

impl AmplRunner {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve the selection MIP: pick q representatives from the correlation
    /// matrix. Returns the tickers whose binary variable came back 1.
    pub fn solve_selection(&self, corr: &CorrMatrix, q: usize) -> Result<Vec<String>> {
        let data = render_selection_data(corr, q);
        let stdout = self.run_model(SELECTION_MODEL, "selection", &data, "y")?;
        let values = parse_display(&stdout, "y")?;

        let selected: Vec<String> = values
            .into_iter()
            .filter(|(_, v)| (*v - 1.0).abs() < 0.5)
            .map(|(t, _)| t)
            .collect();
        debug!("Solver selected {} tickers", selected.len());
        Ok(selected)
    }

    /// Solve the attribute-matching LP: minimally perturb `x_orig` so that
    /// feature exposures respect the targets. Returns ticker -> weight for
    /// strictly positive weights.
    pub fn solve_rebalance(
        &self,
        universe: &[String],
        x_orig: &[f64],
        attrs: &AttributeTable,
        targets: &BTreeMap<String, f64>,
    ) -> Result<Vec<(String, f64)>> {
        let data = render_rebalance_data(universe, x_orig, attrs, targets);
        let stdout = self.run_model(REBALANCE_MODEL, "rebalance", &data, "x")?;
        let values = parse_display(&stdout, "x")?;

        Ok(values.into_iter().filter(|(_, v)| *v > 0.0).collect())
    }

    /// Write the data and run script, spawn AMPL, and return its stdout.
    fn run_model(&self, model: &str, stem: &str, data: &str, var: &str) -> Result<String> {
        fs::create_dir_all(&self.config.work_dir)?;

        let model_path = self.config.model_dir.join(model);
        if !model_path.exists() {
            return Err(ReplicationError::SolverError(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        let data_path = self.config.work_dir.join(format!("{}.dat", stem));
        fs::write(&data_path, data)?;

        let run_path = self.config.work_dir.join(format!("{}.run", stem));
        fs::write(&run_path, self.render_run_script(&model_path, &data_path, var))?;

        debug!(
            "Invoking {} on {} with data {}",
            self.config.ampl_cmd,
            model_path.display(),
            data_path.display()
        );

        let output = Command::new(&self.config.ampl_cmd)
            .arg(&run_path)
            .output()
            .map_err(|e| {
                ReplicationError::SolverError(format!(
                    "Failed to spawn '{}': {}",
                    self.config.ampl_cmd, e
                ))
            })?;

        if !self.config.keep_files {
            let _ = fs::remove_file(&data_path);
            let _ = fs::remove_file(&run_path);
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReplicationError::SolverError(format!(
                "{} exited with {}: {}",
                self.config.ampl_cmd,
                output.status,
                stderr.trim()
            )));
        }

        if stdout.contains("infeasible") {
            warn!("Solver reported an infeasible problem");
        }

        Ok(stdout)
    }

    fn render_run_script(&self, model: &Path, data: &Path, var: &str) -> String {
        format!(
            "model \"{}\";\n\
             data \"{}\";\n\
             option solver {};\n\
             option solver_msg 0;\n\
             solve;\n\
             option display_1col 100000;\n\
             display {};\n",
            model.display(),
            data.display(),
            self.config.solver_name,
            var
        )
    }
}

/// Render the selection data file: ticker set, cardinality q, and the square
/// correlation table at four decimals.
pub fn render_selection_data(corr: &CorrMatrix, q: usize) -> String {
    let tickers = corr.tickers();
    let mut out = String::new();

    let _ = writeln!(out, "set STOCKS := {} ;", tickers.join(" "));
    let _ = writeln!(out);
    let _ = writeln!(out, "param q := {} ;", q);
    let _ = writeln!(out);
    let _ = writeln!(out, "param r:\n    {} :=", tickers.join(" "));
    for (i, t) in tickers.iter().enumerate() {
        let row = corr
            .row(i)
            .iter()
            .map(|v| format!("{:.4}", v))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "{} {}", t, row);
    }
    out.push_str(";\n");
    out
}

/// Render the rebalancing data file: full universe, available features,
/// original weights, indicator table, and exposure targets.
pub fn render_rebalance_data(
    universe: &[String],
    x_orig: &[f64],
    attrs: &AttributeTable,
    targets: &BTreeMap<String, f64>,
) -> String {
    let features: Vec<&String> = targets.keys().collect();
    let mut out = String::new();

    let _ = writeln!(out, "set STOCKS := {} ;", universe.join(" "));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "set FEATURES := {} ;",
        features
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "param x_orig :=");
    for (t, w) in universe.iter().zip(x_orig.iter()) {
        let _ = writeln!(out, "  {} {:.6}", t, w);
    }
    out.push_str(";\n\n");

    let _ = writeln!(
        out,
        "param a : {} :=",
        features
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    );
    for t in universe {
        let row = features
            .iter()
            .map(|f| if attrs.has(t, f) { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "{} {}", t, row);
    }
    out.push_str(";\n\n");

    let _ = writeln!(out, "param f :=");
    for (feature, target) in targets {
        let _ = writeln!(out, "  {} {:.6}", feature, target);
    }
    out.push_str(";\n");
    out
}

/// Parse a `display var;` block from AMPL stdout.
///
/// The block looks like:
///
/// ```text
/// y [*] :=
/// AAPL 1
/// MSFT 0
/// ;
/// ```
///
/// Entries may also be packed several per line; tokens after the `:=` are
/// consumed pairwise until the terminating `;`.
pub fn parse_display(stdout: &str, var: &str) -> Result<Vec<(String, f64)>> {
    let header_bracket = format!("{} [*] :=", var);
    let header_plain = format!("{} :=", var);

    let start = stdout
        .lines()
        .position(|l| {
            let l = l.trim();
            l.starts_with(&header_bracket) || l == header_plain
        })
        .ok_or_else(|| {
            ReplicationError::SolverOutput(format!(
                "No display block for variable '{}' in solver output",
                var
            ))
        })?;

    let mut values = Vec::new();
    let mut done = false;

    for line in stdout.lines().skip(start + 1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace().peekable();
        while let Some(tok) = tokens.next() {
            if tok == ";" {
                done = true;
                break;
            }
            let tok = tok.trim_end_matches(';');
            let name = tok.trim_matches('\'').trim_matches('"');
            if name.is_empty() {
                done = line.ends_with(';');
                break;
            }

            let value_tok = tokens.next().ok_or_else(|| {
                ReplicationError::SolverOutput(format!(
                    "Dangling entry '{}' in display block for '{}'",
                    name, var
                ))
            })?;
            let value_tok = value_tok.trim_end_matches(';');
            let value: f64 = value_tok.parse().map_err(|_| {
                ReplicationError::SolverOutput(format!(
                    "Bad value '{}' for '{}' in display block",
                    value_tok, name
                ))
            })?;
            values.push((name.to_string(), value));

            if line.ends_with(';') && tokens.peek().is_none() {
                done = true;
            }
        }

        if done {
            break;
        }
    }

    if !done {
        return Err(ReplicationError::SolverOutput(format!(
            "Unterminated display block for variable '{}'",
            var
        )));
    }

    Ok(values)
}
