use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// One scope frame.  Frames are shared through `Rc<RefCell<_>>` because a
/// closure may keep its defining frame alive after the block or call that
/// created it has finished.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    /// A root frame with no parent (the globals).
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Convenience: a fresh child frame already wrapped for sharing.
    pub fn child_of(enclosing: &Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    pub fn enclosing(&self) -> Option<Rc<RefCell<Environment>>> {
        self.enclosing.clone()
    }

    /// Create or overwrite `name` in this frame.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup: this frame, then each parent in turn.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            return Ok(value.clone());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),
            None => Err(undefined_variable(name)),
        }
    }

    /// Dynamic assignment: the nearest frame that already holds `name`.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(undefined_variable(name)),
        }
    }

    /// Read `name` straight out of this frame, with no parent walk.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }
}

fn undefined_variable(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

/// The frame exactly `distance` parents above `env`.
pub fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Option<Rc<RefCell<Environment>>> {
    let mut current: Rc<RefCell<Environment>> = Rc::clone(env);

    for _ in 0..distance {
        let parent: Option<Rc<RefCell<Environment>>> = current.borrow().enclosing();
        current = parent?;
    }

    Some(current)
}

/// Resolver‑informed read: jump `distance` frames up and look only there.
pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &Token) -> Result<Value> {
    debug!("get_at distance={} name={}", distance, name.lexeme);

    ancestor(env, distance)
        .and_then(|frame| frame.borrow().get_local(&name.lexeme))
        .ok_or_else(|| undefined_variable(name))
}

/// Resolver‑informed write: jump `distance` frames up and define there.
pub fn assign_at(
    env: &Rc<RefCell<Environment>>,
    distance: usize,
    name: &Token,
    value: Value,
) -> Result<()> {
    debug!("assign_at distance={} name={}", distance, name.lexeme);

    let frame: Rc<RefCell<Environment>> =
        ancestor(env, distance).ok_or_else(|| undefined_variable(name))?;

    frame.borrow_mut().define(&name.lexeme, value);

    Ok(())
}
