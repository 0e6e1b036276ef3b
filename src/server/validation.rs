use crate::server::dto::{LoginRequest, RatingRequest, StoreRequest, UserRequest};
use crate::server::response::{ApiError, FieldError};
use crate::stats::{MAX_RATING, MIN_RATING};

const MIN_NAME_LEN: usize = 20;
const MAX_NAME_LEN: usize = 60;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 16;
const MAX_ADDRESS_LEN: usize = 400;
const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Collects every failing field of one payload before rejecting it.
#[derive(Debug, Default)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Records `result` under `field` if it failed.
    pub fn check(&mut self, field: &'static str, result: Result<(), String>) {
        if let Err(message) = result {
            self.push(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(self.0))
        }
    }
}

pub fn validate_user_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if len < MIN_NAME_LEN {
        return Err(format!("Name must be at least {MIN_NAME_LEN} characters"));
    }
    if len > MAX_NAME_LEN {
        return Err(format!("Name cannot exceed {MAX_NAME_LEN} characters"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(format!("Password cannot exceed {MAX_PASSWORD_LEN} characters"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err("Password must contain at least one special character".to_string());
    }
    Ok(())
}

/// Accepts `local@domain.tld` with no whitespace and non-empty labels.
pub fn validate_email(email: &str) -> Result<(), String> {
    let invalid = || Err("Invalid email address".to_string());
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return invalid();
    }
    let Some((local, domain)) = email.split_once('@') else {
        return invalid();
    };
    if local.is_empty() || domain.contains('@') {
        return invalid();
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return invalid();
    }
    Ok(())
}

pub fn validate_address(address: &str) -> Result<(), String> {
    if address.chars().count() > MAX_ADDRESS_LEN {
        return Err(format!("Address cannot exceed {MAX_ADDRESS_LEN} characters"));
    }
    Ok(())
}

pub fn validate_user_request(req: &UserRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrors::new();
    errors.check("name", validate_user_name(&req.name));
    errors.check("email", validate_email(&req.email));
    errors.check("password", validate_password(&req.password));
    if req.password != req.confirm_password {
        errors.push("confirmPassword", "Passwords do not match");
    }
    errors.check("address", validate_address(&req.address));
    errors.finish()
}

pub fn validate_login(req: &LoginRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrors::new();
    errors.check("email", validate_email(&req.email));
    if req.password.is_empty() {
        errors.push("password", "Password is required");
    }
    errors.finish()
}

/// Checks the store fields. The owner is resolved by the caller.
pub fn validate_store(req: &StoreRequest) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if req.name.trim().is_empty() {
        errors.push("name", "Store name is required");
    }
    errors.check("email", validate_email(&req.email));
    errors.check("address", validate_address(&req.address));
    errors
}

/// Returns the store id and the star value as an integer in range.
pub fn validate_rating(req: &RatingRequest) -> Result<(i64, i64), ApiError> {
    let mut errors = ValidationErrors::new();

    if req.store_id.is_none() {
        errors.push("store_id", "Store is required");
    }

    let value = match req.rating {
        None => {
            errors.push("rating", "Rating is required");
            None
        }
        Some(v) if v.fract() != 0.0 => {
            errors.push("rating", "Rating must be a whole number");
            None
        }
        Some(v) if v < MIN_RATING as f64 || v > MAX_RATING as f64 => {
            errors.push(
                "rating",
                format!("Rating must be between {MIN_RATING} and {MAX_RATING}"),
            );
            None
        }
        Some(v) => Some(v as i64),
    };

    match (req.store_id, value) {
        (Some(store_id), Some(value)) if errors.is_empty() => Ok((store_id, value)),
        _ => Err(ApiError::validation(errors.0)),
    }
}
