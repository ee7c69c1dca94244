use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use coil::{
    Container, ContainerCallback, ContainerError, ContainerFactory, Definition, Dependency,
    ExtendableContainerFactory, Extensions, Object, ObjectCallback, ObjectContext,
    PostWrapperContainerFactory, StdError, TypeRef, wrapper_fn,
};

fn init_container(container: &Container) -> Result<(), ContainerError> {
    container.register("a", Definition::new(|_| Ok(123i32)))?;
    container.register("b", Definition::new(|_| Ok("hello".to_string())))?;
    container.register(
        "c",
        Definition::new(|args| Ok(args.get::<String>(0)?.len()))
            .depends_on(Dependency::of::<String>()),
    )?;
    Ok(())
}

struct Append {
    priority: i32,
    suffix: &'static str,
}

impl ObjectCallback for Append {
    fn after_wrap(&self, ctx: &ObjectContext<'_>) -> Result<Object, StdError> {
        match ctx.downcast_ref::<String>() {
            Some(v) => Ok(Arc::new(format!("{v}{}", self.suffix))),
            None => Ok(ctx.object().clone()),
        }
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[test]
fn test_object_callbacks_priority_order() {
    // Registered out of order on purpose.
    let extensions = Extensions::new()
        .with_object_callback(Append {
            priority: 2,
            suffix: "!",
        })
        .with_object_callback(Append {
            priority: 1,
            suffix: " hi",
        });
    let factory = ExtendableContainerFactory::new(init_container, extensions);
    let container = factory.create().unwrap();

    assert_eq!(container.get::<String>().unwrap().as_str(), "hello hi!");
    // Dependents see the wrapped object.
    assert_eq!(*container.get::<usize>().unwrap(), "hello hi!".len());
    assert_eq!(*container.get::<i32>().unwrap(), 123);
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

struct RecordCallback {
    recorder: Arc<Recorder>,
}

impl ObjectCallback for RecordCallback {
    fn after_init(&self, ctx: &ObjectContext<'_>) -> Result<(), StdError> {
        self.recorder
            .events
            .lock()
            .unwrap()
            .push(format!("init {}", ctx.id()));
        Ok(())
    }

    fn after_wrap(&self, ctx: &ObjectContext<'_>) -> Result<Object, StdError> {
        self.recorder
            .events
            .lock()
            .unwrap()
            .push(format!("wrap {}", ctx.id()));
        Ok(ctx.object().clone())
    }
}

#[test]
fn test_object_callbacks_lifecycle() {
    let recorder = Arc::new(Recorder::default());
    let hooks = recorder.clone();
    let factory = ExtendableContainerFactory::new(
        move |container: &Container| -> Result<(), ContainerError> {
            let init_hooks = hooks.clone();
            let wrap_hooks = hooks.clone();
            container.register(
                "x",
                Definition::new(|_| Ok(1u8))
                    .on_init(move |_: &u8| {
                        init_hooks.events.lock().unwrap().push("own init".into());
                        Ok(())
                    })
                    .on_wrap(move |object| {
                        wrap_hooks.events.lock().unwrap().push("own wrap".into());
                        Ok(object)
                    }),
            )
        },
        Extensions::new().with_object_callback(RecordCallback {
            recorder: recorder.clone(),
        }),
    );
    let container = factory.create().unwrap();
    assert!(recorder.events.lock().unwrap().is_empty());

    container.get_object("x").unwrap();
    container.get_object("x").unwrap();
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["own init", "init x", "own wrap", "wrap x"]
    );
}

struct CountObjects {
    priority: i32,
    seen: Arc<Mutex<Vec<(i32, usize)>>>,
}

impl ContainerCallback for CountObjects {
    fn after_container_init(&self, container: &Container) -> Result<(), StdError> {
        self.seen
            .lock()
            .unwrap()
            .push((self.priority, container.len()));
        if self.priority == 1 {
            container.register("late", Definition::new(|_| Ok("late".to_string())))?;
        }
        Ok(())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[test]
fn test_container_callbacks() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let extensions = Extensions::new()
        .with_container_callback(CountObjects {
            priority: 5,
            seen: seen.clone(),
        })
        .with_container_callback(CountObjects {
            priority: 1,
            seen: seen.clone(),
        })
        .with_object_callback(Append {
            priority: 1,
            suffix: "?",
        });
    let factory = ExtendableContainerFactory::new(init_container, extensions);
    let container = factory.create().unwrap();

    // Each callback ran once, in priority order, on the populated container.
    assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (5, 4)]);
    // Objects registered by container callbacks are decorated too.
    assert_eq!(
        container.get_by_id::<String>("late").unwrap().as_str(),
        "late?"
    );
}

#[test]
fn test_extension_post_wrappers() {
    let extensions = Extensions::new()
        .with_post_wrapper(wrapper_fn(-10, |ctx| match ctx.downcast_ref::<String>() {
            Some(v) => Ok(Arc::new(format!("{v}."))),
            None => Ok(ctx.object().clone()),
        }))
        .with_object_callback(Append {
            priority: 1,
            suffix: " hi",
        })
        .with_post_wrapper(wrapper_fn(-20, |ctx| match ctx.downcast_ref::<i32>() {
            Some(v) => Ok(Arc::new(v + 1)),
            None => Ok(ctx.object().clone()),
        }));
    assert_eq!(extensions.post_wrappers().len(), 2);
    let container = ExtendableContainerFactory::new(init_container, extensions)
        .create()
        .unwrap();

    // Post wrappers fold after the object callbacks.
    assert_eq!(container.get::<String>().unwrap().as_str(), "hello hi.");
    assert_eq!(*container.get::<i32>().unwrap(), 124);
}

struct FailingCallback;

impl ContainerCallback for FailingCallback {
    fn after_container_init(&self, _container: &Container) -> Result<(), StdError> {
        Err("not ready".into())
    }
}

#[test]
fn test_container_callback_error() {
    let factory = ExtendableContainerFactory::new(
        init_container,
        Extensions::new().with_container_callback(FailingCallback),
    );
    assert!(matches!(
        factory.create(),
        Err(ContainerError::ContainerCallback(_))
    ));
}

#[test]
fn test_decoration_preserves_contract() {
    let factory = ExtendableContainerFactory::new(
        init_container,
        Extensions::new().with_object_callback(Append {
            priority: 1,
            suffix: "",
        }),
    );
    let container = factory.create().unwrap();

    let definition = container.get_definition("c").unwrap();
    assert_eq!(definition.object_type().primary(), TypeRef::of::<usize>());
    assert_eq!(definition.dependencies(), [Dependency::of::<String>()]);
    assert_eq!(container.get_object_ids().len(), 3);
}

struct OriginalDefinition {
    calls: AtomicUsize,
}

impl ObjectCallback for OriginalDefinition {
    fn after_init(&self, ctx: &ObjectContext<'_>) -> Result<(), StdError> {
        // The context exposes the undecorated definition and the new container.
        assert!(ctx.container().contains(ctx.id()));
        assert!(ctx.definition().object_type().is_assignable_to(&TypeRef::of::<i32>()));
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_callback_context() {
    let callback = Arc::new(OriginalDefinition {
        calls: AtomicUsize::new(0),
    });
    let mut extensions = Extensions::new();
    extensions.add_shared_object_callback(callback.clone());
    let factory = ExtendableContainerFactory::new(
        |container: &Container| -> Result<(), ContainerError> {
            container.register("n", Definition::new(|_| Ok(7i32)))
        },
        extensions,
    );
    let container = factory.create().unwrap();
    assert_eq!(*container.get::<i32>().unwrap(), 7);
    assert_eq!(*container.get::<i32>().unwrap(), 7);
    assert_eq!(callback.calls.load(Ordering::SeqCst), 1);
}

fn base_factory() -> Result<Container, ContainerError> {
    let container = Container::new();
    container.register("a", Definition::new(|_| Ok(123i32)))?;
    container.register("b", Definition::new(|_| Ok("hello".to_string())))?;
    Ok(container)
}

#[test]
fn test_post_wrappers() {
    let mut factory = PostWrapperContainerFactory::new(base_factory);
    factory.add_wrapper(wrapper_fn(1, |ctx| match ctx.downcast_ref::<i32>() {
        Some(v) => Ok(Arc::new(v + 1)),
        None => Ok(ctx.object().clone()),
    }));
    factory.add_wrapper(wrapper_fn(1, |ctx| match ctx.downcast_ref::<String>() {
        Some(v) => Ok(Arc::new(format!("{v} hi"))),
        None => Ok(ctx.object().clone()),
    }));
    let container = factory.create().unwrap();

    assert_eq!(*container.get::<i32>().unwrap(), 124);
    assert_eq!(container.get::<String>().unwrap().as_str(), "hello hi");
}

#[test]
fn test_post_wrappers_priority_order() {
    let factory = PostWrapperContainerFactory::new(base_factory)
        .with_wrapper(wrapper_fn(10, |ctx| match ctx.downcast_ref::<i32>() {
            Some(v) => Ok(Arc::new(v * 2)),
            None => Ok(ctx.object().clone()),
        }))
        .with_wrapper(wrapper_fn(-1, |ctx| match ctx.downcast_ref::<i32>() {
            Some(v) => Ok(Arc::new(v - 23)),
            None => Ok(ctx.object().clone()),
        }));
    let container = factory.create().unwrap();

    // (123 - 23) * 2
    assert_eq!(*container.get::<i32>().unwrap(), 200);
}

#[test]
fn test_post_wrapper_error() {
    let factory = PostWrapperContainerFactory::new(base_factory)
        .with_wrapper(wrapper_fn(1, |ctx| match ctx.id() {
            "b" => Err("rejected".into()),
            _ => Ok(ctx.object().clone()),
        }));
    let container = factory.create().unwrap();

    assert!(container.get::<i32>().is_ok());
    assert!(matches!(
        container.get::<String>(),
        Err(ContainerError::Hook { id, .. }) if id == "b"
    ));
}

#[test]
fn test_stacked_factories() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let inner = ExtendableContainerFactory::new(
        init_container,
        Extensions::new().with_object_callback(Append {
            priority: 1,
            suffix: " hi",
        }),
    );
    let factory = PostWrapperContainerFactory::new(move || inner.create()).with_wrapper(
        wrapper_fn(1, move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            match ctx.downcast_ref::<String>() {
                Some(v) => Ok(Arc::new(format!("{v}!"))),
                None => Ok(ctx.object().clone()),
            }
        }),
    );
    let container = factory.create().unwrap();

    assert_eq!(container.get::<String>().unwrap().as_str(), "hello hi!");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
