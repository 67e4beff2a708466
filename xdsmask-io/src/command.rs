//! Assembly of the processing engine command line.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};
use xdsmask_core::XdsParam;

/// User-chosen processing options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParameters {
    pub image_dir: PathBuf,
    pub output_dir: PathBuf,
    pub nthreads: Option<u32>,
    /// Resolution limits `(low, high)` in Angstrom.
    pub resolution: Option<(f64, f64)>,
    pub space_group: Option<String>,
    /// `a b c alpha beta gamma`.
    pub cell: Option<[f64; 6]>,
    /// Names passed with `-M`.
    pub macros: Vec<String>,
    /// Free-form tokens appended after the masks.
    pub extra: Vec<XdsParam>,
}

/// One element of the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandArg {
    Flag(String),
    Param(XdsParam),
}

impl CommandArg {
    fn flag(s: impl Into<String>) -> Self {
        Self::Flag(s.into())
    }

    /// Argument as passed to the process.
    #[must_use]
    pub fn to_argv(&self) -> String {
        match self {
            Self::Flag(s) => s.clone(),
            Self::Param(p) => p.to_arg(),
        }
    }
}

/// A fully assembled processing invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingCommand {
    pub program: PathBuf,
    pub args: Vec<CommandArg>,
}

fn format_number(v: f64) -> String {
    let mut s = format!("{v:.3}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

impl ProcessingCommand {
    /// Builds the command from parameters and the session's tokens.
    #[must_use]
    pub fn assemble(
        program: impl Into<PathBuf>,
        params: &ProcessingParameters,
        tokens: &[XdsParam],
    ) -> Self {
        let mut args = vec![
            CommandArg::flag("-I"),
            CommandArg::flag(params.image_dir.display().to_string()),
            CommandArg::flag("-d"),
            CommandArg::flag(params.output_dir.display().to_string()),
        ];
        if let Some(n) = params.nthreads {
            args.push(CommandArg::flag("-nthreads"));
            args.push(CommandArg::flag(n.to_string()));
        }
        if let Some((low, high)) = params.resolution {
            args.push(CommandArg::flag("-R"));
            args.push(CommandArg::flag(format_number(low)));
            args.push(CommandArg::flag(format_number(high)));
        }
        if let Some(sg) = params.space_group.as_deref().filter(|s| !s.trim().is_empty()) {
            args.push(CommandArg::Param(XdsParam::new("symm", sg.trim())));
        }
        if let Some(cell) = params.cell {
            let value = cell.iter().map(|v| format_number(*v)).collect::<Vec<_>>().join(" ");
            args.push(CommandArg::Param(XdsParam::new("cell", value)));
        }
        for name in &params.macros {
            args.push(CommandArg::flag("-M"));
            args.push(CommandArg::flag(name.clone()));
        }
        args.extend(tokens.iter().cloned().map(CommandArg::Param));
        args.extend(params.extra.iter().cloned().map(CommandArg::Param));
        Self {
            program: program.into(),
            args,
        }
    }

    /// Argument vector without the program.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        self.args.iter().map(CommandArg::to_argv).collect()
    }

    /// Shell-pasteable rendering with quoted values.
    #[must_use]
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            match arg {
                CommandArg::Flag(s) if s.contains(char::is_whitespace) => {
                    let _ = write!(line, "'{s}'");
                }
                CommandArg::Flag(s) => line.push_str(s),
                CommandArg::Param(p) => {
                    let _ = write!(line, "{p}");
                }
            }
        }
        line
    }

    /// `std::process::Command` ready to spawn.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.argv());
        command
    }
}
