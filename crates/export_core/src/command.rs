use std::fmt;
use std::str::FromStr;

/// User-facing verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Full pipeline: scan, wait, read, enrich, final pass.
    Run,
    ScanOnly,
    ReadOnly,
    EnrichOnly,
    Cancel,
    /// Drop the live scan result.
    Clear,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command `{0}` (expected run, scan, read, enrich, cancel, clear or status)")]
pub struct CommandParseError(pub String);

impl FromStr for Command {
    type Err = CommandParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let verb: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match verb.as_str() {
            "run" => Ok(Command::Run),
            "scan" | "scanonly" => Ok(Command::ScanOnly),
            "read" | "readonly" => Ok(Command::ReadOnly),
            "enrich" | "enrichonly" => Ok(Command::EnrichOnly),
            "cancel" | "stop" => Ok(Command::Cancel),
            "clear" => Ok(Command::Clear),
            "status" => Ok(Command::Status),
            _ => Err(CommandParseError(raw.trim().to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Command::Run => "run",
            Command::ScanOnly => "scanOnly",
            Command::ReadOnly => "readOnly",
            Command::EnrichOnly => "enrichOnly",
            Command::Cancel => "cancel",
            Command::Clear => "clear",
            Command::Status => "status",
        };
        f.write_str(verb)
    }
}

#[cfg(test)]
mod tests {
    use super::Command;

    #[test]
    fn verbs_parse_case_and_separator_insensitively() {
        assert_eq!("run".parse::<Command>(), Ok(Command::Run));
        assert_eq!("scanOnly".parse::<Command>(), Ok(Command::ScanOnly));
        assert_eq!(" read-only ".parse::<Command>(), Ok(Command::ReadOnly));
        assert_eq!("ENRICH_ONLY".parse::<Command>(), Ok(Command::EnrichOnly));
        assert_eq!("clear".parse::<Command>(), Ok(Command::Clear));
    }

    #[test]
    fn unknown_verb_is_an_error() {
        let err = "explode".parse::<Command>().unwrap_err();
        assert_eq!(err.0, "explode");
    }
}
