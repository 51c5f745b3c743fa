//! The callable capability and its two function flavours: host‑provided
//! natives and user‑defined closures.  Classes are the third implementor,
//! see [`crate::class`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

use crate::class::LoxInstance;
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::stmt::FunctionDecl;
use crate::token::Token;
use crate::value::Value;

/// Anything that can sit to the left of `( … )`.
pub trait Callable {
    /// Exact number of arguments the callee accepts.
    fn arity(&self) -> usize;

    /// Invoke with already‑evaluated, arity‑checked arguments.  `paren` is
    /// the call site's closing parenthesis, used for error locations.
    fn call(&self, interpreter: &mut Interpreter, paren: &Token, arguments: Vec<Value>)
        -> Result<Value>;
}

/// A function implemented in Rust.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value]) -> std::result::Result<Value, String>,
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(
        &self,
        _interpreter: &mut Interpreter,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);

        (self.func)(&arguments).map_err(|msg| LoxError::runtime(paren, msg))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// `clock()`: seconds since the Unix epoch, with sub‑second precision.
pub fn clock() -> NativeFunction {
    NativeFunction {
        name: "clock",
        arity: 0,
        func: |_args: &[Value]| {
            let micros: i64 = chrono::Utc::now().timestamp_micros();

            Ok(Value::Number(micros as f64 / 1_000_000.0))
        },
    }
}

/// A user‑defined function or method together with the frame it closes over.
#[derive(Clone)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    /// A copy of this method whose closure has `this` bound to `instance`.
    /// Every call yields a new frame; bound methods are never cached.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let environment: Rc<RefCell<Environment>> = Environment::child_of(&self.closure);

        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }

    /// `this` from the frame `bind` created.
    fn bound_this(&self) -> Result<Value> {
        self.closure
            .borrow()
            .get_local("this")
            .ok_or_else(|| LoxError::runtime(&self.declaration.name, "Initializer has no 'this'."))
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        _paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        // Parameters live in a child of the closure, not of the caller.
        let environment: Rc<RefCell<Environment>> = Environment::child_of(&self.closure);

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.borrow_mut().define(&param.lexeme, argument);
        }

        let flow: Flow = interpreter.execute_block(&self.declaration.body, environment)?;

        if self.is_initializer {
            return self.bound_this();
        }

        let value: Value = match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        };

        info!("Function '{}' returned: {}", self.name(), value);

        Ok(value)
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name())
            .field("arity", &self.declaration.params.len())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}
