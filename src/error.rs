use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackportError {
    #[error("cannot infer a source resource type for {0} (pass it explicitly)")]
    UnresolvableType(String),

    #[error("{resource} {id} has no value for identifying field '{field}'")]
    MissingIdentifyingValue {
        resource: String,
        id: u64,
        field: &'static str,
    },

    #[error("{kind} {id} is referenced but not present in the source data")]
    UnknownResource { kind: &'static str, id: u64 },

    #[error("'{0}' custom field format is not supported")]
    UnsupportedFieldFormat(String),

    #[error("journal property '{name}' of kind '{kind}' is not supported")]
    UnsupportedProperty { kind: String, name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no value mapping for {0} and prompting is disabled")]
    MappingUnresolved(String),

    #[error("invalid issue filter: {0}")]
    InvalidFilter(String),

    #[error("input closed while waiting for a mapping answer")]
    PromptClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TrackportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnresolvableType(_) => "unresolvable_type",
            Self::MissingIdentifyingValue { .. } => "missing_identifying_value",
            Self::UnknownResource { .. } => "unknown_resource",
            Self::UnsupportedFieldFormat(_) => "unsupported_field_format",
            Self::UnsupportedProperty { .. } => "unsupported_property",
            Self::InvalidConfig(_) => "invalid_config",
            Self::MappingUnresolved(_) => "mapping_unresolved",
            Self::InvalidFilter(_) => "invalid_filter",
            Self::PromptClosed => "prompt_closed",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Yaml(_) => "yaml_error",
        }
    }
}

impl From<dialoguer::Error> for TrackportError {
    fn from(err: dialoguer::Error) -> Self {
        match err {
            dialoguer::Error::IO(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::NotConnected
                ) =>
            {
                Self::PromptClosed
            }
            dialoguer::Error::IO(e) => Self::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackportError>;
