use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::callable::{self, Callable, LoxFunction};
use crate::class::{LoxClass, LoxInstance, INITIALIZER};
use crate::environment::{self, Environment};
use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId};
use crate::stmt::{ClassDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Deepest chain of Lox calls before a runtime "Stack overflow." error.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Grow the native stack when less than this remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// How a statement finished.  `return` is ordinary control flow, not an
/// error: it travels up through blocks and loops as `Flow::Return` and is
/// consumed by the function call that owns it.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// Tree‑walking evaluator.  Global state persists across `interpret` calls,
/// which is what lets a REPL build a program up line by line.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    /// Scope distance for every locally‑resolved variable reference.
    locals: HashMap<ExprId, usize>,
    /// Number of Lox calls currently on the stack.
    depth: usize,
    output: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }

    /// An interpreter whose `print` statements write to `output`.
    pub fn with_output<W: Write + 'static>(output: W) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");

        globals
            .borrow_mut()
            .define("clock", Value::NativeFunction(Rc::new(callable::clock())));

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            depth: 0,
            output: Box::new(output),
        }
    }

    pub fn globals(&self) -> &Rc<RefCell<Environment>> {
        &self.globals
    }

    /// Called by the resolver: `id` refers to a binding `depth` frames up.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local {:?} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Interprets a list of statements (a "program").  Stops at the first
    /// runtime error and hands it back; output printed before the error is
    /// still flushed.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        let result: Result<()> = statements
            .iter()
            .try_for_each(|stmt| self.execute(stmt).map(|_| ()));

        // A failed unwind may leave stale frames behind.
        self.depth = 0;
        self.environment = Rc::clone(&self.globals);

        self.output.flush()?;

        if result.is_ok() {
            info!("Interpretation completed successfully");
        }

        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Block(statements) => {
                let environment = Environment::child_of(&self.environment);

                self.execute_block(statements, environment)
            }

            Stmt::Class(decl) => {
                self.execute_class(decl)?;

                Ok(Flow::Normal)
            }

            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Flow::Normal)
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                let function =
                    LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));

                Ok(Flow::Normal)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)?;

                debug!("Printed value: {}", value);

                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);

                Ok(Flow::Return(value))
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Variable '{}' defined with value: {}", name.lexeme, value);

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(Flow::Normal)
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }

                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` inside `environment`, restoring the current frame
    /// afterwards whether they finished, returned, or failed.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Flow> {
        let previous: Rc<RefCell<Environment>> =
            std::mem::replace(&mut self.environment, environment);

        let result: Result<Flow> = self.execute_all(statements);

        self.environment = previous;

        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    fn execute_class(&mut self, decl: &ClassDecl) -> Result<()> {
        debug!("Defining class '{}'", decl.name.lexeme);

        let superclass: Option<Rc<LoxClass>> = match &decl.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let token: &Token = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => &decl.name,
                    };

                    return Err(LoxError::runtime(token, "Superclass must be a class."));
                }
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(&decl.name.lexeme, Value::Nil);

        // Methods of a subclass close over an extra frame holding `super`.
        let enclosing: Rc<RefCell<Environment>> = Rc::clone(&self.environment);

        if let Some(superclass) = &superclass {
            self.environment = Environment::child_of(&enclosing);
            self.environment
                .borrow_mut()
                .define("super", Value::Class(Rc::clone(superclass)));
        }

        let methods: HashMap<String, LoxFunction> = decl
            .methods
            .iter()
            .map(|method| {
                let function = LoxFunction::new(
                    Rc::clone(method),
                    Rc::clone(&self.environment),
                    method.name.lexeme == INITIALIZER,
                );

                (method.name.lexeme.clone(), function)
            })
            .collect();

        let class = LoxClass::new(decl.name.lexeme.clone(), superclass, methods);

        self.environment = enclosing;

        self.environment
            .borrow_mut()
            .assign(&decl.name, Value::Class(Rc::new(class)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;

                binary(operator, left, right)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                let Some(function) = callee.as_callable() else {
                    return Err(LoxError::runtime(
                        paren,
                        "Can only call functions and classes.",
                    ));
                };

                if values.len() != function.arity() {
                    return Err(LoxError::runtime(
                        paren,
                        format!(
                            "Expected {} arguments but got {}.",
                            function.arity(),
                            values.len()
                        ),
                    ));
                }

                self.call(function, paren, values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Literal(literal) => Ok(Value::from(literal)),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;

                instance.borrow_mut().set(name, value.clone());

                Ok(value)
            }

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
                    },
                    _ => Err(LoxError::runtime(operator, "Invalid unary operator.")),
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(name, *id),
        }
    }

    /// Invoke `function`, failing once calls nest deeper than
    /// [`MAX_CALL_DEPTH`].  The native stack grows on demand so the limit,
    /// not the host thread's stack size, decides when recursion stops.
    fn call(
        &mut self,
        function: &dyn Callable,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(LoxError::runtime(paren, "Stack overflow."));
        }

        self.depth += 1;

        let result: Result<Value> = stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || {
            function.call(self, paren, arguments)
        });

        self.depth -= 1;

        result
    }

    /// Resolved references jump straight to their frame; the rest are globals.
    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    /// `super.method`: the superclass sits `distance` frames up and the
    /// instance (`this`) one frame below it.
    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance: usize = self
            .locals
            .get(&id)
            .copied()
            .ok_or_else(|| LoxError::runtime(keyword, "Unresolved 'super'."))?;

        let Value::Class(superclass) = environment::get_at(&self.environment, distance, keyword)?
        else {
            return Err(LoxError::runtime(keyword, "Superclass must be a class."));
        };

        let this_token = Token::new(TokenType::THIS, "this", keyword.line);
        let Value::Instance(instance) =
            environment::get_at(&self.environment, distance.saturating_sub(1), &this_token)?
        else {
            return Err(LoxError::runtime(keyword, "Can't use 'super' without an instance."));
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(LoxError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }
}

/// Arithmetic, comparison and equality on already‑evaluated operands.
fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    match operator.token_type {
        TokenType::PLUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            _ => Err(LoxError::runtime(
                operator,
                "Operands must be two numbers or two strings.",
            )),
        },

        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),
        TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

        _ => {
            let (a, b) = number_operands(operator, &left, &right)?;

            match operator.token_type {
                TokenType::MINUS => Ok(Value::Number(a - b)),
                TokenType::STAR => Ok(Value::Number(a * b)),
                TokenType::SLASH => Ok(Value::Number(a / b)),
                TokenType::GREATER => Ok(Value::Bool(a > b)),
                TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                TokenType::LESS => Ok(Value::Bool(a < b)),
                TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
                _ => Err(LoxError::runtime(operator, "Invalid binary operator.")),
            }
        }
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => {
            debug!(
                "Operator '{}' rejected {} and {}",
                operator.lexeme,
                left.type_name(),
                right.type_name()
            );

            Err(LoxError::runtime(operator, "Operands must be numbers."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(token_type: TokenType, lexeme: &str) -> Token {
        Token::new(token_type, lexeme, 1)
    }

    #[test]
    fn plus_adds_numbers_and_concatenates_strings() {
        let plus = op(TokenType::PLUS, "+");

        assert_eq!(
            binary(&plus, Value::Number(1.0), Value::Number(2.0)).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            binary(&plus, Value::String("a".into()), Value::String("b".into())).unwrap(),
            Value::String("ab".into())
        );
    }

    #[test]
    fn plus_rejects_mixed_operands() {
        let err = binary(
            &op(TokenType::PLUS, "+"),
            Value::String("a".into()),
            Value::Number(1.0),
        )
        .unwrap_err();

        assert_eq!(err.message(), "Operands must be two numbers or two strings.");
    }

    #[test]
    fn comparison_requires_numbers() {
        let err = binary(&op(TokenType::LESS, "<"), Value::Nil, Value::Number(1.0)).unwrap_err();

        assert_eq!(err.message(), "Operands must be numbers.");
    }

    #[test]
    fn division_by_zero_is_infinite() {
        let result = binary(
            &op(TokenType::SLASH, "/"),
            Value::Number(1.0),
            Value::Number(0.0),
        )
        .unwrap();

        assert_eq!(result, Value::Number(f64::INFINITY));
    }

    #[test]
    fn clock_is_predefined() {
        let interpreter = Interpreter::new();
        let clock = op(TokenType::IDENTIFIER, "clock");

        let value = interpreter.globals().borrow().get(&clock).unwrap();

        assert_eq!(value.to_string(), "<native fn>");
        assert_eq!(value.as_callable().map(|c| c.arity()), Some(0));
    }
}
