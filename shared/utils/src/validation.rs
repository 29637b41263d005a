use crate::error::{StudyError, StudyResult};
use validator::{Validate, ValidationError, ValidationErrors};

pub fn validate_request<T: Validate>(request: &T) -> StudyResult<()> {
    request.validate().map_err(StudyError::from)
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, field_errors) in fields {
        for error in field_errors {
            let message = match &error.message {
                Some(message) => message.to_string(),
                None => match &*error.code {
                    "not_blank" => format!("Field '{}' is required", field),
                    "length" => format!("Length validation failed for field '{}'", field),
                    code => format!("Validation failed for field '{}': {}", field, code),
                },
            };
            messages.push(message);
        }
    }

    messages.dedup();
    messages.join(", ")
}

/// Rejects empty and whitespace-only strings.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}

impl From<ValidationErrors> for StudyError {
    fn from(errors: ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .min()
            .map(|f| f.to_string())
            .unwrap_or_else(|| "request".to_string());
        StudyError::validation(field, format_validation_errors(&errors))
    }
}
