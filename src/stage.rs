use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Unknown stage '{0}', expected ПД or РД")]
pub struct UnknownStage(pub String);

/// Documentation stage; selects the segmentation and substitution variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Project documentation (ПД): sections and subsections, one volume per row
    Project,
    /// Working documentation (РД): flat list of document sets after the general plan
    Working,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Project, Stage::Working];

    /// Returns the label shown to users.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "ПД",
            Self::Working => "РД",
        }
    }

    /// Parses a stage from its label or an alias (case-insensitive):
    /// - Project: "ПД", "pd", "project"
    /// - Working: "РД", "rd", "working"
    pub fn parse(name: &str) -> Result<Self, UnknownStage> {
        match name.trim().to_lowercase().as_str() {
            "пд" | "pd" | "project" => Ok(Self::Project),
            "рд" | "rd" | "working" => Ok(Self::Working),
            _ => Err(UnknownStage(name.to_string())),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_labels_and_aliases() {
        assert_eq!(Stage::parse("ПД").unwrap(), Stage::Project);
        assert_eq!(Stage::parse(" рд ").unwrap(), Stage::Working);
        assert_eq!("PD".parse::<Stage>().unwrap(), Stage::Project);
        assert_eq!(Stage::parse("working").unwrap(), Stage::Working);
        assert!(Stage::parse("ИД").is_err());
    }

    #[test]
    fn labels_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::parse(stage.as_str()).unwrap(), stage);
        }
    }
}
