use log::debug;

use super::Strategy;
use crate::train::Train;
use crate::{Error, Result};

/// Discard any iteration that made the error worse.
///
/// Before each iteration the encoded network and the error are saved; if the
/// iteration raised the error, both are restored. The first iteration is
/// always kept, since there is no meaningful error to compare against yet.
///
/// Requires the trained model to be [`crate::Encodable`].
#[derive(Debug, Clone, Default)]
pub struct Greedy {
    last_error: f64,
    last_network: Vec<f64>,
    ready: bool,
}

impl Greedy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for Greedy {
    fn init(&mut self, train: &mut dyn Train) -> Result<()> {
        let method = train.encodable_mut().ok_or_else(|| {
            Error::UnsupportedMethod(
                "the greedy strategy requires an encodable model".to_owned(),
            )
        })?;
        self.last_network = vec![0.0; method.encoded_array_len()];
        self.ready = false;
        Ok(())
    }

    fn pre_iteration(&mut self, train: &mut dyn Train) -> Result<()> {
        self.last_error = train.error();
        if let Some(method) = train.encodable_mut() {
            method.encode_to_array(&mut self.last_network)?;
        }
        Ok(())
    }

    fn post_iteration(&mut self, train: &mut dyn Train) -> Result<()> {
        if !self.ready {
            self.ready = true;
            return Ok(());
        }
        if train.error() > self.last_error {
            debug!("greedy strategy dropped last iteration");
            train.set_error(self.last_error);
            if let Some(method) = train.encodable_mut() {
                method.decode_from_array(&self.last_network)?;
            }
        }
        Ok(())
    }
}
