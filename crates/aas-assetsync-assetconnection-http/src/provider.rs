//! HTTP value, polling subscription and operation providers.

use crate::config::{HttpOperationProviderConfig, HttpSubscriptionProviderConfig, HttpValueProviderConfig};
use crate::connection::Endpoint;
use aas_assetsync_assetconnection::{
    content, AssetConnectionError, AssetOperationProvider, AssetSubscriptionProvider,
    AssetValueProvider, NewDataListener, OperationCompletion, OperationOutput, ServiceContext,
};
use aas_assetsync_core::{ElementValue, Reference, SubmodelElement, ValueMappingError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

fn io(reference: &Reference, detail: impl ToString) -> AssetConnectionError {
    AssetConnectionError::Io {
        reference: reference.clone(),
        detail: detail.to_string(),
    }
}

/// Fetch a resource and map it to a value of the referenced element.
async fn fetch_value(
    endpoint: &Endpoint,
    context: &dyn ServiceContext,
    reference: &Reference,
    path: &str,
    query: Option<&str>,
) -> Result<ElementValue, AssetConnectionError> {
    let client = endpoint.client(reference)?;
    let type_info = context
        .type_info(reference)
        .ok_or_else(|| io(reference, "element does not exist or has no value"))?;
    let body = client.get(path).await.map_err(|e| io(reference, e))?;
    content::parse_payload(reference, &body, query, &type_info)
}

/// Reads with `GET`, writes with the configured method.
pub struct HttpValueProvider {
    reference: Reference,
    config: HttpValueProviderConfig,
    endpoint: Arc<Endpoint>,
    context: Arc<dyn ServiceContext>,
}

impl HttpValueProvider {
    pub(crate) fn new(
        reference: Reference,
        config: HttpValueProviderConfig,
        endpoint: Arc<Endpoint>,
        context: Arc<dyn ServiceContext>,
    ) -> Self {
        Self {
            reference,
            config,
            endpoint,
            context,
        }
    }
}

#[async_trait]
impl AssetValueProvider for HttpValueProvider {
    async fn get_value(&self) -> Result<ElementValue, AssetConnectionError> {
        fetch_value(
            &self.endpoint,
            self.context.as_ref(),
            &self.reference,
            &self.config.path,
            self.config.query.as_deref(),
        )
        .await
    }

    async fn set_value(&self, value: ElementValue) -> Result<(), AssetConnectionError> {
        let client = self.endpoint.client(&self.reference)?;
        let body = content::render_payload(&value, self.config.template.as_deref());
        client
            .send(self.config.write_method.into(), &self.config.path, body)
            .await
            .map_err(|e| io(&self.reference, e))?;
        Ok(())
    }
}

/// Last value a poll loop handed to its listener.
#[derive(Debug, Default)]
struct ChangeTracker {
    delivered: Option<ElementValue>,
}

impl ChangeTracker {
    /// Notify `listener` if `value` differs from the last delivered value.
    ///
    /// A value the listener dropped is not remembered, so the next poll offers it again.
    fn offer(&mut self, listener: &NewDataListener, value: ElementValue) -> bool {
        if self.delivered.as_ref() == Some(&value) {
            return false;
        }
        if !listener.notify(value.clone()) {
            return false;
        }
        self.delivered = Some(value);
        true
    }
}

/// Polls a resource and reports the value whenever it changes.
pub struct HttpSubscriptionProvider {
    reference: Reference,
    config: HttpSubscriptionProviderConfig,
    endpoint: Arc<Endpoint>,
    context: Arc<dyn ServiceContext>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HttpSubscriptionProvider {
    pub(crate) fn new(
        reference: Reference,
        config: HttpSubscriptionProviderConfig,
        endpoint: Arc<Endpoint>,
        context: Arc<dyn ServiceContext>,
    ) -> Self {
        Self {
            reference,
            config,
            endpoint,
            context,
            task: Mutex::new(None),
        }
    }
}

impl Drop for HttpSubscriptionProvider {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

#[async_trait]
impl AssetSubscriptionProvider for HttpSubscriptionProvider {
    async fn subscribe(&self, listener: NewDataListener) -> Result<(), AssetConnectionError> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(AssetConnectionError::AlreadySubscribed(self.reference.clone()));
        }

        let reference = self.reference.clone();
        let config = self.config.clone();
        let endpoint = Arc::clone(&self.endpoint);
        let context = Arc::clone(&self.context);

        tracing::info!(
            reference = %reference,
            path = %config.path,
            interval_ms = config.interval_ms,
            "Starting HTTP polling subscription"
        );

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tracker = ChangeTracker::default();

            loop {
                interval.tick().await;
                let value = match fetch_value(
                    &endpoint,
                    context.as_ref(),
                    &reference,
                    &config.path,
                    config.query.as_deref(),
                )
                .await
                {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(reference = %reference, error = %e, "Poll error");
                        continue;
                    }
                };

                tracker.offer(&listener, value);
            }
        }));
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), AssetConnectionError> {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::info!(reference = %self.reference, "Stopped HTTP polling subscription");
        }
        Ok(())
    }

    fn is_subscribed(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

/// Sends the arguments as a JSON object keyed by idShort.
///
/// The response must be a JSON object; members named like an output variable
/// or an in-out argument are mapped onto it, everything else is ignored.
pub struct HttpOperationProvider {
    reference: Reference,
    config: HttpOperationProviderConfig,
    endpoint: Arc<Endpoint>,
    output_variables: Vec<SubmodelElement>,
}

impl HttpOperationProvider {
    pub(crate) fn new(
        reference: Reference,
        config: HttpOperationProviderConfig,
        endpoint: Arc<Endpoint>,
        output_variables: Vec<SubmodelElement>,
    ) -> Self {
        Self {
            reference,
            config,
            endpoint,
            output_variables,
        }
    }

    fn request_body(
        &self,
        input: &[SubmodelElement],
        inoutput: &[SubmodelElement],
    ) -> Result<String, AssetConnectionError> {
        let mut arguments = Map::new();
        for argument in input.iter().chain(inoutput) {
            let value = argument
                .to_value()
                .map_err(|source| AssetConnectionError::Mapping {
                    reference: self.reference.clone(),
                    source,
                })?;
            arguments.insert(argument.id_short.clone(), value.to_json());
        }
        Ok(Value::Object(arguments).to_string())
    }

    /// Apply response members to copies of `templates`.
    fn map_arguments(
        &self,
        response: &Map<String, Value>,
        templates: &[SubmodelElement],
    ) -> Result<Vec<SubmodelElement>, AssetConnectionError> {
        let mapping = |source: ValueMappingError| AssetConnectionError::Mapping {
            reference: self.reference.clone(),
            source,
        };
        templates
            .iter()
            .map(|template| {
                let mut argument = template.clone();
                if let Some(json) = response.get(&template.id_short) {
                    let type_info = argument.type_info().map_err(mapping)?;
                    let value = ElementValue::from_json(&type_info, json).map_err(mapping)?;
                    argument.set_value(value).map_err(mapping)?;
                }
                Ok(argument)
            })
            .collect()
    }
}

#[async_trait]
impl AssetOperationProvider for HttpOperationProvider {
    async fn invoke(
        &self,
        input: &[SubmodelElement],
        inoutput: &[SubmodelElement],
    ) -> Result<OperationOutput, AssetConnectionError> {
        let client = self.endpoint.client(&self.reference)?;
        let body = self.request_body(input, inoutput)?;

        tracing::debug!(reference = %self.reference, path = %self.config.path, "Invoking HTTP operation");
        let response = client
            .send(self.config.method.into(), &self.config.path, body)
            .await
            .map_err(|e| io(&self.reference, e))?;

        let response = if response.iter().all(u8::is_ascii_whitespace) {
            Map::new()
        } else {
            match serde_json::from_slice::<Value>(&response) {
                Ok(Value::Object(members)) => members,
                Ok(_) => return Err(io(&self.reference, "response is not a JSON object")),
                Err(e) => return Err(io(&self.reference, format!("invalid JSON response: {e}"))),
            }
        };

        Ok(OperationOutput {
            output: self.map_arguments(&response, &self.output_variables)?,
            inoutput: self.map_arguments(&response, inoutput)?,
        })
    }

    fn invoke_async(
        self: Arc<Self>,
        input: Vec<SubmodelElement>,
        inoutput: Vec<SubmodelElement>,
        completion: OperationCompletion,
    ) -> Result<(), AssetConnectionError> {
        self.endpoint.client(&self.reference)?;
        tokio::spawn(async move {
            let result = self.invoke(&input, &inoutput).await;
            completion.complete(result);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_assetsync_core::{KeyType, TypedValue};
    use tokio::sync::mpsc;

    fn double(v: f64) -> ElementValue {
        ElementValue::Property(Some(TypedValue::Double(v)))
    }

    #[test]
    fn tracker_suppresses_repeats() {
        let (tx, mut rx) = mpsc::channel(4);
        let reference = Reference::submodel("urn:sm").child(KeyType::Property, "A");
        let listener = NewDataListener::new(reference, tx);
        let mut tracker = ChangeTracker::default();

        assert!(tracker.offer(&listener, double(1.0)));
        assert!(!tracker.offer(&listener, double(1.0)));
        assert!(tracker.offer(&listener, double(2.0)));
        assert_eq!(rx.try_recv().unwrap().value, double(1.0));
        assert_eq!(rx.try_recv().unwrap().value, double(2.0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn tracker_retries_value_dropped_by_full_queue() {
        let (tx, mut rx) = mpsc::channel(1);
        let reference = Reference::submodel("urn:sm").child(KeyType::Property, "A");
        let listener = NewDataListener::new(reference, tx);
        let mut tracker = ChangeTracker::default();

        assert!(tracker.offer(&listener, double(1.0)));
        // queue full, the change is dropped
        assert!(!tracker.offer(&listener, double(2.0)));

        assert_eq!(rx.try_recv().unwrap().value, double(1.0));
        // the asset still reports 2.0 and it is delivered now
        assert!(tracker.offer(&listener, double(2.0)));
        assert_eq!(rx.try_recv().unwrap().value, double(2.0));
    }
}
