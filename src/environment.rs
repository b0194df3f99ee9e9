use strum::{Display, EnumString};

/// Deployment environment, selected through `APP_ENVIRONMENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    /// Base name of the configuration file for this environment, without extension.
    #[must_use]
    pub fn config_file(self) -> String {
        format!("config/{self}")
    }
}
