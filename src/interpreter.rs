//! Tree-walking evaluator.
//!
//! Executes statements and evaluates expressions over a chain of lexical
//! environments.  Non-local control flow (`return`, `break`) is interpreter
//! state: the flags are checked after every statement and on entry to
//! `execute`/`evaluate`, short-circuiting execution up to the nearest
//! enclosing call or loop frame, which resets them.
//!
//! Variable references resolved by the [`Resolver`](crate::resolver::Resolver)
//! are read with `get_at`/`assign_at` at the recorded hop depth; unresolved
//! references go straight to the globals frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use log::debug;

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::{LoxError, Result, RuntimeError, StackFrame};
use crate::function::{self, LoxFunction};
use crate::token::{Token, TokenType};
use crate::value::Value;

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    /// Resolver output: expression id -> hops to the binding frame.
    locals: HashMap<ExprId, usize>,
    break_current_loop: bool,
    is_returning_value: bool,
    /// Currently executing callables, outermost first.  Snapshotted into
    /// runtime errors.
    call_stack: Vec<StackFrame>,
    /// When set, `+` also concatenates a string with a number through
    /// stringification.
    cross_add: bool,
    /// Test sink for `print`; stdout when absent.
    output: Option<Rc<RefCell<Vec<u8>>>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals
            .borrow_mut()
            .define("clock", Value::Native(function::clock()));

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            break_current_loop: false,
            is_returning_value: false,
            call_stack: Vec::new(),
            cross_add: false,
            output: None,
        }
    }

    pub fn set_cross_add(&mut self, cross_add: bool) {
        self.cross_add = cross_add;
    }

    /// Redirects `print` output, for tests.
    pub fn set_output(&mut self, sink: Rc<RefCell<Vec<u8>>>) {
        self.output = Some(sink);
    }

    /// Called by the resolver for every local variable occurrence.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// The resolver's depth map, keyed by expression id.
    pub fn locals(&self) -> &HashMap<ExprId, usize> {
        &self.locals
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.execute(stmt)?;
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement execution
    // ─────────────────────────────────────────────────────────────────────

    /// Executes one statement.  The returned value is only meaningful for
    /// `return` propagation: a `Return` statement yields its operand, and the
    /// block executor forwards it while `is_returning_value` is set.
    fn execute(&mut self, stmt: &Stmt) -> Result<Value> {
        if self.break_current_loop {
            return Ok(Value::Nil);
        }

        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Value::Nil)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                self.write_output(&value.to_string());

                Ok(Value::Nil)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(Value::Nil)
            }

            Stmt::Block(statements) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));

                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Value::Nil)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    let value = self.execute(body)?;

                    if self.is_returning_value {
                        // Leave the flag set; the enclosing call resets it.
                        return Ok(value);
                    }

                    if self.break_current_loop {
                        break;
                    }
                }

                self.break_current_loop = false;

                Ok(Value::Nil)
            }

            Stmt::Break { .. } => {
                self.break_current_loop = true;

                Ok(Value::Nil)
            }

            Stmt::Return { value, .. } => {
                let value: Value = if let Some(expr) = value {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.is_returning_value = true;

                Ok(value)
            }

            Stmt::Function(declaration) => {
                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(Value::Nil)
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Executes `statements` in `env`, restoring the previous environment on
    /// every exit path.  Short-circuits when a statement sets the return or
    /// break flag.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<Value> {
        let previous: Rc<RefCell<Environment>> = Rc::clone(&self.environment);

        self.environment = env;

        let mut result: Result<Value> = Ok(Value::Nil);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(value) => {
                    if self.is_returning_value {
                        result = Ok(value);
                        break;
                    }

                    if self.break_current_loop {
                        break;
                    }
                }

                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<Value> {
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    let token = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => name,
                    };

                    return Err(self.error(token, "Superclass must be a class."));
                }
            },

            None => None,
        };

        // The class name is defined before the methods are built so the body
        // environment chain already contains the binding.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let previous = Rc::clone(&self.environment);

        if let Some(superclass) = &superclass_value {
            let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                &self.environment,
            ))));

            env.borrow_mut()
                .define("super", Value::Class(Rc::clone(superclass)));

            self.environment = env;
        }

        let mut method_map: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for declaration in methods {
            let is_initializer = declaration.name.lexeme == "init";

            let method = LoxFunction::new(
                Rc::clone(declaration),
                Rc::clone(&self.environment),
                is_initializer,
            );

            method_map.insert(declaration.name.lexeme.clone(), Rc::new(method));
        }

        self.environment = previous;

        let class = LoxClass::new(name.lexeme.clone(), superclass_value, method_map);

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(Rc::new(class)))
            .map_err(|msg| self.error(name, msg))?;

        Ok(Value::Nil)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression evaluation
    // ─────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        if self.break_current_loop {
            return Ok(Value::Nil);
        }

        match expr {
            Expr::Literal(token) => self.evaluate_literal(token),

            Expr::Grouping(expr) => self.evaluate(expr),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                match operator.token_type {
                    TokenType::OR if left_val.is_truthy() => Ok(left_val),
                    TokenType::AND if !left_val.is_truthy() => Ok(left_val),
                    _ => self.evaluate(right),
                }
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { id, name } => self.lookup_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(depth) => {
                        Environment::assign_at(
                            &self.environment,
                            *depth,
                            &name.lexeme,
                            value.clone(),
                        )
                        .map_err(|msg| self.error(name, msg))?;
                    }

                    None => {
                        self.globals
                            .borrow_mut()
                            .assign(&name.lexeme, value.clone())
                            .map_err(|msg| self.error(name, msg))?;
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.call_value(callee_val, args, paren)
            }

            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => LoxInstance::get(&instance, &name.lexeme)
                        .ok_or_else(|| {
                            self.error(name, format!("Undefined property '{}'.", name.lexeme))
                        }),

                    Value::Dict(entries) => {
                        let value = entries.borrow().get(&name.lexeme).cloned();

                        value.ok_or_else(|| {
                            self.error(name, format!("Undefined property '{}'.", name.lexeme))
                        })
                    }

                    _ => Err(self.error(name, "Only instances have properties.")),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.borrow_mut().set(&name.lexeme, value.clone());
                        Ok(value)
                    }

                    Value::Dict(entries) => {
                        let value = self.evaluate(value)?;
                        entries
                            .borrow_mut()
                            .insert(name.lexeme.clone(), value.clone());
                        Ok(value)
                    }

                    _ => Err(self.error(name, "Only instances have properties.")),
                }
            }

            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::List { elements, .. } => {
                let mut values: Vec<Value> = Vec::with_capacity(elements.len());

                for element in elements {
                    values.push(self.evaluate(element)?);
                }

                Ok(Value::new_list(values))
            }

            Expr::Dict { entries, .. } => {
                let mut map: HashMap<String, Value> = HashMap::with_capacity(entries.len());

                for (key, value) in entries {
                    let key_text = dict_key_text(key);
                    let value = self.evaluate(value)?;

                    if map.insert(key_text, value).is_some() {
                        return Err(self.error(key, "Duplicate key in dictionary."));
                    }
                }

                Ok(Value::new_dict(map))
            }

            Expr::Select {
                object,
                bracket,
                index,
            } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;

                self.select(object, index, bracket)
            }

            Expr::SelectSet {
                object,
                bracket,
                index,
                value,
            } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                let value = self.evaluate(value)?;

                self.select_set(object, index, value, bracket)
            }
        }
    }

    fn evaluate_literal(&self, token: &Token) -> Result<Value> {
        match &token.token_type {
            TokenType::NUMBER(n) => Ok(Value::Number(*n)),

            TokenType::STRING(s) => Ok(Value::String(s.clone())),

            TokenType::TRUE => Ok(Value::Bool(true)),

            TokenType::FALSE => Ok(Value::Bool(false)),

            TokenType::NIL => Ok(Value::Nil),

            _ => Err(self.error(token, "Invalid literal.")),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(self.error(operator, "Operand must be a number.")),
            },

            TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

            _ => Err(self.error(operator, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),

                (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_))
                    if self.cross_add =>
                {
                    Ok(Value::String(format!("{}{}", left, right)))
                }

                _ => Err(self.error(operator, "Operands must be two numbers or two strings.")),
            },

            TokenType::MINUS => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(self.error(operator, "Operands must be numbers.")),
            },

            TokenType::STAR => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(self.error(operator, "Operands must be numbers.")),
            },

            TokenType::SLASH => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => {
                    if *b == 0.0 {
                        Err(self.error(operator, "Division by zero."))
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }

                _ => Err(self.error(operator, "Operands must be numbers.")),
            },

            TokenType::GREATER => self.compare(left, right, operator, |o| o.is_gt()),

            TokenType::GREATER_EQUAL => self.compare(left, right, operator, |o| o.is_ge()),

            TokenType::LESS => self.compare(left, right, operator, |o| o.is_lt()),

            TokenType::LESS_EQUAL => self.compare(left, right, operator, |o| o.is_le()),

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            _ => Err(self.error(operator, "Invalid binary operator.")),
        }
    }

    /// `< <= > >=` on two numbers (IEEE-754 partial order; comparisons with
    /// NaN are false) or two strings (lexicographic).
    fn compare(
        &self,
        left: Value,
        right: Value,
        operator: &Token,
        check: fn(std::cmp::Ordering) -> bool,
    ) -> Result<Value> {
        match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => {
                Ok(Value::Bool(a.partial_cmp(b).is_some_and(check)))
            }

            (Value::String(a), Value::String(b)) => Ok(Value::Bool(check(a.cmp(b)))),

            _ => Err(self.error(operator, "Operands must be two numbers or two strings.")),
        }
    }

    fn lookup_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(depth) => Environment::get_at(&self.environment, *depth, &name.lexeme)
                .map_err(|msg| self.error(name, msg)),

            None => self
                .globals
                .borrow()
                .get(&name.lexeme)
                .map_err(|msg| self.error(name, msg)),
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        // The resolver bound `super` at class-declaration depth; `this` lives
        // one frame closer to the method body.
        let depth = *self
            .locals
            .get(&id)
            .ok_or_else(|| self.error(keyword, "Undefined variable 'super'."))?;

        let superclass = Environment::get_at(&self.environment, depth, "super")
            .map_err(|msg| self.error(keyword, msg))?;

        let this = Environment::get_at(&self.environment, depth - 1, "this")
            .map_err(|msg| self.error(keyword, msg))?;

        let superclass = match superclass {
            Value::Class(class) => class,
            _ => return Err(self.error(keyword, "Superclass must be a class.")),
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(this)))),

            None => Err(self.error(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> Result<Value> {
        let arity = match &callee {
            Value::Native(native) => native.arity,
            Value::Function(function) => function.arity(),
            Value::Class(class) => class.arity(),

            _ => return Err(self.error(paren, "Can only call functions and classes.")),
        };

        if args.len() != arity {
            return Err(self.error(
                paren,
                format!("Expected {} arguments but got {}.", arity, args.len()),
            ));
        }

        debug!("Calling {} with {} argument(s)", callee, args.len());

        self.call_stack.push(StackFrame {
            name: callee.to_string(),
            line: paren.line,
        });

        let result = match &callee {
            Value::Native(native) => (native.func)(&args).map_err(|msg| self.error(paren, msg)),

            Value::Function(function) => self.call_function(function, args),

            Value::Class(class) => self.instantiate(class, args),

            _ => unreachable!("arity check rejects non-callables"),
        };

        self.call_stack.pop();
        self.is_returning_value = false;

        result
    }

    /// Runs a user function: fresh frame under the closure, parameters bound
    /// to arguments, body executed as a block.  Initializers always yield
    /// `this`, including on bare `return;` and fall-off.
    fn call_function(&mut self, function: &Rc<LoxFunction>, args: Vec<Value>) -> Result<Value> {
        let env = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &function.closure,
        ))));

        for (param, arg) in function.declaration.params.iter().zip(args) {
            env.borrow_mut().define(&param.lexeme, arg);
        }

        let value = self.execute_block(&function.declaration.body, env)?;

        if function.is_initializer {
            return Environment::get_at(&function.closure, 0, "this")
                .map_err(|msg| self.error(&function.declaration.name, msg));
        }

        if self.is_returning_value {
            Ok(value)
        } else {
            Ok(Value::Nil)
        }
    }

    fn instantiate(&mut self, class: &Rc<LoxClass>, args: Vec<Value>) -> Result<Value> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(class))));

        if let Some(initializer) = class.find_method("init") {
            let bound = Rc::new(initializer.bind(Value::Instance(Rc::clone(&instance))));
            self.call_function(&bound, args)?;
        }

        Ok(Value::Instance(instance))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Subscripting
    // ─────────────────────────────────────────────────────────────────────

    fn select(&self, object: Value, index: Value, bracket: &Token) -> Result<Value> {
        match object {
            Value::Dict(entries) => match index {
                Value::String(key) => {
                    let value = entries.borrow().get(&key).cloned();

                    value.ok_or_else(|| {
                        self.error(bracket, format!("Undefined property '{}'.", key))
                    })
                }

                _ => Err(self.error(bracket, "Property name must be a string.")),
            },

            Value::List(elements) => {
                let elements = elements.borrow();
                let position = self.list_index(&index, elements.len(), bracket)?;

                Ok(elements[position].clone())
            }

            _ => Err(self.error(bracket, "Only dictionaries or list can have properties.")),
        }
    }

    fn select_set(
        &self,
        object: Value,
        index: Value,
        value: Value,
        bracket: &Token,
    ) -> Result<Value> {
        match object {
            Value::Dict(entries) => match index {
                Value::String(key) => {
                    entries.borrow_mut().insert(key, value.clone());

                    Ok(value)
                }

                _ => Err(self.error(bracket, "Property name must be a string.")),
            },

            Value::List(elements) => {
                let mut elements = elements.borrow_mut();
                let position = self.list_index(&index, elements.len(), bracket)?;

                elements[position] = value.clone();

                Ok(value)
            }

            _ => Err(self.error(bracket, "Only dictionaries or list can have properties.")),
        }
    }

    fn list_index(&self, index: &Value, len: usize, bracket: &Token) -> Result<usize> {
        let n = match index {
            Value::Number(n) => *n,
            _ => return Err(self.error(bracket, "Index must be a number.")),
        };

        if n.fract() != 0.0 || n < 0.0 || (n as usize) >= len {
            return Err(self.error(
                bracket,
                format!("Index out of range: {}", Value::Number(n)),
            ));
        }

        Ok(n as usize)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Plumbing
    // ─────────────────────────────────────────────────────────────────────

    fn write_output(&mut self, text: &str) {
        match &self.output {
            Some(sink) => {
                let _ = writeln!(sink.borrow_mut(), "{}", text);
            }

            None => println!("{}", text),
        }
    }

    /// Builds a runtime error carrying the offending token and a snapshot of
    /// the active call stack.
    fn error<S: Into<String>>(&self, token: &Token, message: S) -> LoxError {
        LoxError::Runtime(RuntimeError {
            lexeme: token.lexeme.clone(),
            line: token.line,
            message: message.into(),
            stack: self.call_stack.clone(),
        })
    }
}

/// The key text of a dictionary entry: string literals contribute their
/// unquoted contents, identifiers their lexeme.
fn dict_key_text(key: &Token) -> String {
    match &key.token_type {
        TokenType::STRING(s) => s.clone(),
        _ => key.lexeme.clone(),
    }
}
