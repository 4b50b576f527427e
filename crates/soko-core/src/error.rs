use thiserror::Error;

/// Marketplace engine error types.
///
/// Each variant maps to an HTTP status code via [`MarketError::status_code`].
/// Use [`MarketError::to_body`] to produce a structured, user-displayable
/// JSON body for transport layers.
#[derive(Error, Debug)]
pub enum MarketError {
    // --- 400 Bad Request ---
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Illegal status change: {0}")]
    ForbiddenTransition(String),

    // --- 403 Forbidden ---
    #[error("You must verify your email and phone before creating listings")]
    VerificationRequired,

    #[error("No active subscription found")]
    NoSubscription,

    #[error(
        "You have reached your listing limit ({max_listings} listings) on the {plan} plan. \
         Upgrade your plan to create more listings."
    )]
    QuotaExceeded {
        plan: String,
        max_listings: i32,
        used: i32,
    },

    #[error("{0}")]
    Forbidden(String),

    // --- 404 Not Found ---
    #[error("{0}")]
    NotFound(String),

    // --- 409 Conflict ---
    #[error("{0}")]
    Conflict(String),

    // --- 500 Internal Server Error ---
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::ForbiddenTransition(_) => 400,
            Self::VerificationRequired
            | Self::NoSubscription
            | Self::QuotaExceeded { .. }
            | Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => 500,
        }
    }

    /// Structured JSON body for client display.
    ///
    /// Internal errors (500) use a generic message to avoid leaking details.
    /// Quota and verification variants carry the extra flags clients key on.
    pub fn to_body(&self) -> serde_json::Value {
        let status = self.status_code();
        if status == 500 {
            return serde_json::json!({ "error": "Internal server error" });
        }
        match self {
            Self::VerificationRequired => serde_json::json!({
                "error": self.to_string(),
                "verification_required": true,
            }),
            Self::NoSubscription => serde_json::json!({
                "error": "No active subscription found. Please contact support.",
                "needs_subscription": true,
            }),
            Self::QuotaExceeded {
                plan,
                max_listings,
                used,
            } => serde_json::json!({
                "error": self.to_string(),
                "quota_exceeded": true,
                "current_plan": plan,
                "max_listings": max_listings,
                "listings_used": used,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        }
    }

    // --- Constructors ---

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn forbidden_transition(message: impl Into<String>) -> Self {
        Self::ForbiddenTransition(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<validator::ValidationErrors> for MarketError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut parts: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value for {}", field))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        parts.sort();
        MarketError::Validation(parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

#[cfg(feature = "sqlx-postgres")]
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    DatabaseError::Constraint(db_err.to_string())
                } else {
                    DatabaseError::Query(db_err.to_string())
                }
            }
            sqlx::Error::PoolClosed => DatabaseError::Connection("Pool closed".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::Connection("Pool timed out".to_string()),
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

#[cfg(feature = "sqlx-postgres")]
impl From<sqlx::Error> for MarketError {
    fn from(err: sqlx::Error) -> Self {
        MarketError::Database(DatabaseError::from(err))
    }
}

pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exceeded_body_carries_plan_details() {
        let err = MarketError::QuotaExceeded {
            plan: "Basic Plan".to_string(),
            max_listings: 1,
            used: 1,
        };
        assert_eq!(err.status_code(), 403);
        let body = err.to_body();
        assert_eq!(body["quota_exceeded"], true);
        assert_eq!(body["current_plan"], "Basic Plan");
        assert_eq!(body["max_listings"], 1);
        assert_eq!(body["listings_used"], 1);
    }

    #[test]
    fn internal_errors_render_generic_body() {
        let err = MarketError::internal("pool exploded");
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_body()["error"], "Internal server error");
    }

    #[test]
    fn forbidden_transition_is_bad_request() {
        assert_eq!(
            MarketError::forbidden_transition("cannot set active").status_code(),
            400
        );
    }
}
