use std::env;

/// Environment variables that override defaults of the live collaborators.
pub enum Arg {
    NoDefault(&'static str),
    WithDefault(&'static str, &'static str),
}

/// Host of the GCE metadata server.
pub const METADATA_HOST: Arg = Arg::WithDefault("GCE_METADATA_HOST", "metadata.google.internal");

/// Cloud Logging API endpoint, e.g. to point at an emulator.
pub const LOGGING_ENDPOINT: Arg =
    Arg::WithDefault("GUESTLOG_LOGGING_ENDPOINT", "https://logging.googleapis.com");

/// A fixed bearer token for the Cloud Logging API. When unset, tokens come from the metadata
/// server.
pub const ACCESS_TOKEN: Arg = Arg::NoDefault("GUESTLOG_ACCESS_TOKEN");

impl Arg {
    pub fn name(&self) -> &'static str {
        match self {
            Arg::NoDefault(name) | Arg::WithDefault(name, _) => name,
        }
    }

    /// The value, if the variable is set and not empty.
    pub fn get(&self) -> Option<String> {
        env::var(self.name()).ok().filter(|v| !v.is_empty())
    }

    /// The value or the default. Empty for an unset [`Arg::NoDefault`].
    pub fn val(&self) -> String {
        match self {
            Arg::NoDefault(_) => self.get().unwrap_or_default(),
            Arg::WithDefault(_, default) => self.get().unwrap_or_else(|| default.to_string()),
        }
    }

    pub fn provided(&self) -> bool {
        self.get().is_some()
    }
}
