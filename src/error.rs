use thiserror::Error;

#[derive(Error, Debug)]
pub enum StarportError {
    // Catalog errors
    #[error("unknown module id: {id}")]
    UnknownId { id: String },

    #[error("unknown module: {descriptor}")]
    UnknownModule { descriptor: String },

    #[error("unknown ship: {name}")]
    UnknownShip { name: String },

    #[error("catalog load error: {0}")]
    CatalogLoad(String),

    // Lookup errors
    #[error("system not found: {name}")]
    SystemNotFound { name: String },

    #[error("station {station} not found in system {system}")]
    StationNotFound { system: String, station: String },

    // Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    // Serialization errors
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // Feed errors
    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, StarportError>;

impl StarportError {
    pub fn status_code(&self) -> u16 {
        match self {
            StarportError::SystemNotFound { .. } | StarportError::StationNotFound { .. } => 404,

            StarportError::UnknownId { .. }
            | StarportError::UnknownModule { .. }
            | StarportError::UnknownShip { .. }
            | StarportError::Validation(_) => 400,

            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_status_codes() {
        let err = StarportError::SystemNotFound {
            name: "Sol".into(),
        };
        assert_eq!(err.status_code(), 404);

        let err = StarportError::StationNotFound {
            system: "Sol".into(),
            station: "Abraham Lincoln".into(),
        };
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_caller_error_status_codes() {
        let err = StarportError::UnknownId { id: "zz".into() };
        assert_eq!(err.status_code(), 400);

        let err = StarportError::UnknownShip {
            name: "Millennium Falcon".into(),
        };
        assert_eq!(err.status_code(), 400);

        let err = StarportError::Validation("bad input".into());
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_default_status_code() {
        let err = StarportError::CatalogLoad("truncated".into());
        assert_eq!(err.status_code(), 500);

        let err = StarportError::Config("missing key".into());
        assert_eq!(err.status_code(), 500);

        let err = StarportError::Decompression("bad header".into());
        assert_eq!(err.status_code(), 500);

        let err = StarportError::Transport("connection reset".into());
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_display_formatting() {
        let err = StarportError::UnknownModule {
            descriptor: "beam laser 2E fixed".into(),
        };
        assert!(err.to_string().contains("beam laser 2E fixed"));

        let err = StarportError::StationNotFound {
            system: "Lave".into(),
            station: "Lave Station".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Lave"));
        assert!(msg.contains("Lave Station"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: StarportError = json_err.into();
        match &err {
            StarportError::Json(_) => {}
            other => panic!("expected Json, got {:?}", other),
        }
    }
}
