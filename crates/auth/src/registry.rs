//! Explicit kernel registry.
//!
//! One independently configured kernel per principal type, built at process
//! start and passed by reference to request handlers. There is no hidden
//! process-wide default instance.

use std::collections::HashMap;
use std::sync::Arc;

use crate::kernel::AuthKernel;

#[derive(Default)]
pub struct KernelRegistry {
    kernels: HashMap<String, Arc<AuthKernel>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kernel under its login type. Re-registering a type
    /// replaces the previous kernel.
    pub fn register(mut self, kernel: AuthKernel) -> Self {
        self.kernels
            .insert(kernel.login_type().as_str().to_string(), Arc::new(kernel));
        self
    }

    pub fn get(&self, login_type: &str) -> Option<&Arc<AuthKernel>> {
        self.kernels.get(login_type)
    }

    pub fn login_types(&self) -> impl Iterator<Item = &str> {
        self.kernels.keys().map(String::as_str)
    }
}
