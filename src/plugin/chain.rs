use std::sync::Arc;
use crate::core::{DatabaseError, ExecutionContext, StatementResult};
use super::invocation::{Arguments, Invocation};
use super::{Interceptor, Properties, Signature};

/// Ordered, immutable interceptor list shared by every session of a factory
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self {
            interceptors: Arc::from(Vec::new()),
        }
    }
}

impl InterceptorChain {
    /// Chain in exactly the given order
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors: Arc::from(interceptors),
        }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Runs `dispatch` behind every interceptor that handles `signature`
    pub fn invoke<F>(
        &self,
        signature: Signature,
        args: Arguments,
        ctx: &ExecutionContext,
        mut dispatch: F,
    ) -> Result<StatementResult, DatabaseError>
    where
        F: FnMut(Arguments, &ExecutionContext) -> Result<StatementResult, DatabaseError>,
    {
        let matching: Arc<[Arc<dyn Interceptor>]> = self
            .interceptors
            .iter()
            .filter(|i| i.intercepts(&signature))
            .cloned()
            .collect();
        if matching.is_empty() {
            return dispatch(args, ctx);
        }
        tracing::trace!(%signature, interceptors = matching.len(), "intercepting call");
        let mut invocation = Invocation::new(signature, args, ctx.clone(), matching, &mut dispatch);
        invocation.proceed()
    }
}

struct Registration {
    interceptor: Box<dyn Interceptor>,
    order: i32,
    enabled: bool,
}

/// Setup surface for plugins: register, configure, enable and order them,
/// then `build` the chain
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Registration>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, interceptor: impl Interceptor + 'static) -> &mut Self {
        let order = interceptor.order();
        self.plugins.push(Registration {
            interceptor: Box::new(interceptor),
            order,
            enabled: true,
        });
        self
    }

    fn registration(&mut self, name: &str) -> Result<&mut Registration, DatabaseError> {
        self.plugins
            .iter_mut()
            .find(|p| p.interceptor.name() == name)
            .ok_or_else(|| DatabaseError::PluginNotFound(name.to_string()))
    }

    pub fn configure(&mut self, name: &str, properties: &Properties) -> Result<(), DatabaseError> {
        self.registration(name)?.interceptor.set_properties(properties);
        Ok(())
    }

    pub fn enable(&mut self, name: &str) -> Result<(), DatabaseError> {
        self.registration(name)?.enabled = true;
        Ok(())
    }

    pub fn disable(&mut self, name: &str) -> Result<(), DatabaseError> {
        self.registration(name)?.enabled = false;
        Ok(())
    }

    /// Overrides the order the interceptor declared
    pub fn set_order(&mut self, name: &str, order: i32) -> Result<(), DatabaseError> {
        self.registration(name)?.order = order;
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.interceptor.name()).collect()
    }

    /// Enabled plugins sorted by order; equal orders keep registration order
    pub fn build(self) -> InterceptorChain {
        let mut plugins: Vec<Registration> = self.plugins.into_iter().filter(|p| p.enabled).collect();
        plugins.sort_by_key(|p| p.order);
        InterceptorChain::new(
            plugins
                .into_iter()
                .map(|p| Arc::from(p.interceptor))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Parameter, UpdateCount, Value};
    use crate::plugin::Target;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        order: i32,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn intercepts(&self, signature: &Signature) -> bool {
            signature.target == Target::Executor
        }

        fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<StatementResult, DatabaseError> {
            self.log.lock().push(format!("pre:{}", self.name));
            let result = invocation.proceed();
            self.log.lock().push(format!("post:{}", self.name));
            result
        }
    }

    fn recorder(name: &'static str, order: i32, log: &Arc<Mutex<Vec<String>>>) -> Recorder {
        Recorder {
            name,
            order,
            log: Arc::clone(log),
        }
    }

    fn run(chain: &InterceptorChain, log: &Arc<Mutex<Vec<String>>>) -> Result<StatementResult, DatabaseError> {
        chain.invoke(
            Signature::executor("update"),
            Arguments::statement("user.insert", Parameter::None),
            &ExecutionContext::default(),
            |_, _| {
                log.lock().push("target".to_string());
                Ok(StatementResult::Affected(UpdateCount::Rows(1)))
            },
        )
    }

    #[test]
    fn test_orders_wrap_target() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        registry
            .register(recorder("three", 3, &log))
            .register(recorder("one", 1, &log))
            .register(recorder("two", 2, &log));
        let chain = registry.build();
        assert_eq!(chain.names(), vec!["one", "two", "three"]);

        run(&chain, &log).unwrap();
        assert_eq!(
            *log.lock(),
            vec!["pre:one", "pre:two", "pre:three", "target", "post:three", "post:two", "post:one"]
        );
    }

    #[test]
    fn test_equal_orders_keep_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        registry
            .register(recorder("b", 0, &log))
            .register(recorder("a", 0, &log));
        assert_eq!(registry.build().names(), vec!["b", "a"]);
    }

    #[test]
    fn test_disabled_and_reordered() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        registry
            .register(recorder("a", 1, &log))
            .register(recorder("b", 2, &log))
            .register(recorder("c", 3, &log));
        registry.disable("b").unwrap();
        registry.set_order("c", 0).unwrap();
        assert!(matches!(registry.enable("zzz"), Err(DatabaseError::PluginNotFound(_))));
        assert_eq!(registry.build().names(), vec!["c", "a"]);
    }

    struct Veto;

    impl Interceptor for Veto {
        fn name(&self) -> &str {
            "veto"
        }

        fn intercepts(&self, signature: &Signature) -> bool {
            signature.method == "update"
        }

        fn intercept(&self, _invocation: &mut Invocation<'_>) -> Result<StatementResult, DatabaseError> {
            Err(DatabaseError::abort("veto", "writes are disabled"))
        }
    }

    #[test]
    fn test_short_circuit_skips_target() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        registry.register(recorder("outer", 0, &log)).register(Veto);
        let chain = registry.build();

        let result = run(&chain, &log);
        assert!(matches!(result, Err(DatabaseError::InterceptorAbort { interceptor, .. }) if interceptor == "veto"));
        assert_eq!(*log.lock(), vec!["pre:outer", "post:outer"]);
    }

    #[test]
    fn test_signature_filter() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new(vec![Arc::new(recorder("exec", 0, &log))]);
        let result = chain
            .invoke(
                Signature::session("select_one"),
                Arguments::default(),
                &ExecutionContext::default(),
                |_, _| Ok(StatementResult::Unit),
            )
            .unwrap();
        assert_eq!(result, StatementResult::Unit);
        assert!(log.lock().is_empty());
    }

    struct Rewrite {
        value: i64,
    }

    impl Interceptor for Rewrite {
        fn name(&self) -> &str {
            "rewrite"
        }

        fn intercepts(&self, _signature: &Signature) -> bool {
            true
        }

        fn set_properties(&mut self, properties: &Properties) {
            if let Some(value) = properties.get("value").and_then(serde_json::Value::as_i64) {
                self.value = value;
            }
        }

        fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<StatementResult, DatabaseError> {
            invocation.args_mut().parameter = Parameter::from(self.value);
            invocation.set_attribute("rewritten", serde_json::Value::Bool(true));
            invocation.proceed()
        }
    }

    #[test]
    fn test_configure_and_rewrite_arguments() {
        let mut registry = PluginRegistry::new();
        registry.register(Rewrite { value: 0 });
        let properties = Properties::from([("value".to_string(), serde_json::json!(42))]);
        registry.configure("rewrite", &properties).unwrap();
        let chain = registry.build();

        let mut seen = None;
        chain
            .invoke(
                Signature::mapper("find"),
                Arguments::default(),
                &ExecutionContext::default(),
                |args, _| {
                    seen = Some(args.parameter);
                    Ok(StatementResult::Unit)
                },
            )
            .unwrap();
        assert_eq!(seen, Some(Parameter::Single(Value::Integer(42))));
    }
}
