use gb_types::{DataError, GbResult, ModelError};

/// Fraction of predictions equal to the true labels.
pub fn accuracy_score(y_true: &[i64], y_pred: &[i64]) -> GbResult<f64> {
    if y_true.len() != y_pred.len() {
        return Err(DataError::ShapeMismatch {
            expected: y_true.len(),
            actual: y_pred.len(),
        }
        .into());
    }
    if y_true.is_empty() {
        return Err(ModelError::EmptyInput {
            message: "cannot score an empty prediction set".to_string(),
        }
        .into());
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_matches() {
        assert_eq!(accuracy_score(&[0, 1, 1, 0], &[0, 1, 0, 0]).unwrap(), 0.75);
        assert_eq!(accuracy_score(&[2, 2], &[2, 2]).unwrap(), 1.0);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(accuracy_score(&[0, 1], &[0]).is_err());
        assert!(accuracy_score(&[], &[]).is_err());
    }
}
