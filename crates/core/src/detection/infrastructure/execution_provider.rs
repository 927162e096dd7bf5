use ort::execution_providers::ExecutionProviderDispatch;

/// Accelerator the detector asks onnxruntime for on this platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accelerator {
    CoreMl,
    DirectMl,
    Cpu,
}

impl Accelerator {
    pub fn for_platform() -> Self {
        if cfg!(target_os = "macos") {
            Accelerator::CoreMl
        } else if cfg!(target_os = "windows") {
            Accelerator::DirectMl
        } else {
            Accelerator::Cpu
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Accelerator::CoreMl => "CoreML",
            Accelerator::DirectMl => "DirectML",
            Accelerator::Cpu => "CPU",
        }
    }
}

/// Execution providers to register for the platform accelerator.
///
/// An empty list leaves onnxruntime on its CPU provider, which is also
/// where it lands when a registered provider fails to initialize.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}
