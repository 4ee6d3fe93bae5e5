//! ONNX Runtime session loading shared by every model wrapper.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;

use crate::error::PipelineError;

/// Load an ONNX model file into a session guarded by a `Mutex`.
///
/// `Session::run` requires `&mut self`, so every wrapper shares this shape.
pub(crate) fn load_session(model_path: &Path) -> Result<Mutex<Session>, PipelineError> {
    if !model_path.exists() {
        return Err(PipelineError::Model {
            message: format!(
                "Model file not found at {:?}. Run `image2text models download` or export it there.",
                model_path
            ),
        });
    }

    let session = Session::builder()
        .map_err(|e| PipelineError::Model {
            message: format!("Failed to create ONNX session builder: {e}"),
        })?
        .commit_from_file(model_path)
        .map_err(|e| PipelineError::Model {
            message: format!("Failed to load ONNX model {:?}: {e}", model_path),
        })?;

    tracing::debug!(
        "Loaded {:?} (inputs: {:?}, outputs: {:?})",
        model_path,
        input_names(&session),
        session
            .outputs()
            .iter()
            .map(|o| o.name())
            .collect::<Vec<_>>()
    );

    Ok(Mutex::new(session))
}

/// Names of the model's input tensors, in declaration order.
pub(crate) fn input_names(session: &Session) -> Vec<String> {
    session
        .inputs()
        .iter()
        .map(|i| i.name().to_string())
        .collect()
}

/// Flatten an NCHW tensor into the (shape, data) pair ort accepts.
pub(crate) fn flatten(tensor: &Array4<f32>) -> (Vec<i64>, Vec<f32>) {
    let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
    let data: Vec<f32> = tensor.iter().copied().collect();
    (shape, data)
}

/// Map a poisoned-lock error into a model error.
pub(crate) fn lock_error<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::Model {
        message: format!("Session lock poisoned: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_preserves_layout() {
        let mut tensor = Array4::<f32>::zeros((1, 3, 2, 2));
        tensor[[0, 1, 0, 0]] = 2.0;
        let (shape, data) = flatten(&tensor);
        assert_eq!(shape, vec![1, 3, 2, 2]);
        assert_eq!(data.len(), 12);
        // Channel 1 starts after one 2x2 plane.
        assert_eq!(data[4], 2.0);
    }

    #[test]
    fn test_load_session_missing_file() {
        let err = load_session(Path::new("/nonexistent/model.onnx")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
