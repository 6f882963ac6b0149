// ABOUTME: Tree-walking evaluator for the Xenly AST

use crate::ast::{Expr, ImportForm, Program, Stmt};
use crate::env::Environment;
use crate::error::EvalError;
use crate::modules::{lookup_native, ModuleLoader};
use crate::value::{ClassDef, FnDef, InstanceData, Value};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Owns the module cache and the "current directory" a relative `import`
/// is resolved against. One `Interpreter` runs exactly one program (plus
/// whatever `.xe` files it transitively imports).
pub struct Interpreter {
    modules: ModuleLoader,
    source_dir: RefCell<PathBuf>,
}

impl Interpreter {
    pub fn new(source_dir: PathBuf) -> Self {
        Interpreter {
            modules: ModuleLoader::new(),
            source_dir: RefCell::new(source_dir),
        }
    }

    /// Runs a whole program in a fresh global environment. A stray
    /// top-level `return`/`break`/`continue` just ends execution early
    /// rather than erroring; there's no outer loop or call for it to
    /// escape from.
    pub fn run(&self, program: &Program) -> Result<(), EvalError> {
        let global = Environment::new();
        for stmt in program {
            if self.exec_stmt(stmt, &global)?.is_sentinel() {
                break;
            }
        }
        Ok(())
    }

    // --- statements ------------------------------------------------------

    fn exec_block_in(&self, stmts: &[Stmt], env: &Rc<Environment>) -> Result<Value, EvalError> {
        for stmt in stmts {
            let v = self.exec_stmt(stmt, env)?;
            if v.is_sentinel() {
                return Ok(v);
            }
        }
        Ok(Value::Null)
    }

    fn exec_stmt(&self, stmt: &Stmt, env: &Rc<Environment>) -> Result<Value, EvalError> {
        match stmt {
            Stmt::Expr(e) => {
                self.eval_expr(e, env)?;
                Ok(Value::Null)
            }
            Stmt::VarDecl { name, value } => {
                let v = match value {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Null,
                };
                env.define(name.clone(), v);
                Ok(Value::Null)
            }
            Stmt::Block(stmts) => {
                let child = Environment::with_parent(env.clone());
                self.exec_block_in(stmts, &child)
            }
            Stmt::FnDecl {
                name,
                params,
                body,
                is_async,
            } => {
                let fndef = Rc::new(FnDef {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::new(body.clone()),
                    closure: env.clone(),
                    is_async: *is_async,
                });
                env.define(name.clone(), Value::Function(fndef));
                Ok(Value::Null)
            }
            Stmt::Return { value, line: _ } => {
                let v = match value {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Null,
                };
                Ok(Value::Return(Box::new(v)))
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    let child = Environment::with_parent(env.clone());
                    self.exec_block_in(then_branch, &child)
                } else if let Some(eb) = else_branch {
                    let child = Environment::with_parent(env.clone());
                    self.exec_block_in(eb, &child)
                } else {
                    Ok(Value::Null)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_expr(cond, env)?.is_truthy() {
                    let child = Environment::with_parent(env.clone());
                    match self.exec_block_in(body, &child)? {
                        Value::Break => break,
                        v @ Value::Return(_) => return Ok(v),
                        _ => {}
                    }
                }
                Ok(Value::Null)
            }
            Stmt::DoWhile { body, cond } => {
                loop {
                    let child = Environment::with_parent(env.clone());
                    match self.exec_block_in(body, &child)? {
                        Value::Break => break,
                        v @ Value::Return(_) => return Ok(v),
                        _ => {}
                    }
                    if !self.eval_expr(cond, env)?.is_truthy() {
                        break;
                    }
                }
                Ok(Value::Null)
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let loop_env = Environment::with_parent(env.clone());
                self.exec_stmt(init, &loop_env)?;
                while self.eval_expr(cond, &loop_env)?.is_truthy() {
                    let body_env = Environment::with_parent(loop_env.clone());
                    match self.exec_block_in(body, &body_env)? {
                        Value::Break => break,
                        v @ Value::Return(_) => return Ok(v),
                        _ => {}
                    }
                    // `continue` falls through to here too: the update clause
                    // is the continue target, not the condition test.
                    self.exec_stmt(update, &loop_env)?;
                }
                Ok(Value::Null)
            }
            Stmt::ForIn {
                var_name,
                iterable,
                body,
            } => {
                let iterable_val = self.eval_expr(iterable, env)?;
                let items = match iterable_val {
                    Value::Array(items) => items.borrow().clone(),
                    other => {
                        return Err(EvalError::TypeMismatch {
                            line: 0,
                            op: "for-in".into(),
                            lhs: other.type_name().into(),
                            rhs: "array".into(),
                        })
                    }
                };
                for item in items {
                    let child = Environment::with_parent(env.clone());
                    child.define(var_name.clone(), item);
                    match self.exec_block_in(body, &child)? {
                        Value::Break => break,
                        v @ Value::Return(_) => return Ok(v),
                        _ => {}
                    }
                }
                Ok(Value::Null)
            }
            Stmt::Break => Ok(Value::Break),
            Stmt::Continue => Ok(Value::Continue),
            Stmt::Print(exprs) => {
                let mut parts = Vec::with_capacity(exprs.len());
                for e in exprs {
                    parts.push(self.eval_expr(e, env)?.to_string());
                }
                println!("{}", parts.join(" "));
                Ok(Value::Null)
            }
            Stmt::Import { path, form, line } => {
                self.do_import(path, form, env, *line)?;
                Ok(Value::Null)
            }
            Stmt::Export(inner) => self.exec_stmt(inner, env),
            Stmt::ClassDecl {
                name,
                parent,
                methods,
                line,
            } => {
                let parent_cls = match parent {
                    Some(parent_name) => match env.get(parent_name) {
                        Some(Value::Class(cls)) => Some(cls),
                        _ => {
                            return Err(EvalError::UnknownParentClass {
                                line: *line,
                                name: parent_name.clone(),
                            })
                        }
                    },
                    None => None,
                };
                let method_table = Environment::new();
                for m in methods {
                    if let Stmt::FnDecl {
                        name: mname,
                        params,
                        body,
                        is_async,
                    } = m
                    {
                        let fndef = Rc::new(FnDef {
                            name: mname.clone(),
                            params: params.clone(),
                            body: Rc::new(body.clone()),
                            closure: env.clone(),
                            is_async: *is_async,
                        });
                        method_table.define(mname.clone(), Value::Function(fndef));
                    }
                }
                let class_def = Rc::new(ClassDef {
                    name: name.clone(),
                    parent: parent_cls,
                    methods: method_table,
                });
                env.define(name.clone(), Value::Class(class_def));
                Ok(Value::Null)
            }
        }
    }

    // --- expressions -------------------------------------------------------

    fn eval_expr(&self, expr: &Expr, env: &Rc<Environment>) -> Result<Value, EvalError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Identifier(name) => env
                .get(name)
                .ok_or_else(|| EvalError::UndefinedVariable { line: 0, name: name.clone() }),
            Expr::This => env
                .get("this")
                .ok_or(EvalError::ThisOutsideMethod { line: 0 }),
            Expr::Binary { op, left, right, line } => {
                if op == "and" {
                    let l = self.eval_expr(left, env)?;
                    if !l.is_truthy() {
                        return Ok(l);
                    }
                    return self.eval_expr(right, env);
                }
                if op == "or" {
                    let l = self.eval_expr(left, env)?;
                    if l.is_truthy() {
                        return Ok(l);
                    }
                    return self.eval_expr(right, env);
                }
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                apply_binary_op(op, l, r, *line)
            }
            Expr::Unary { op, operand, line } => {
                let v = self.eval_expr(operand, env)?;
                match op.as_str() {
                    "-" => match v {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(EvalError::TypeMismatch {
                            line: *line,
                            op: "-".into(),
                            lhs: other.type_name().into(),
                            rhs: "number".into(),
                        }),
                    },
                    "not" => Ok(Value::Bool(!v.is_truthy())),
                    _ => Ok(Value::Null),
                }
            }
            Expr::Assign { name, value, line } => {
                let v = self.eval_expr(value, env)?;
                if !env.update(name, v.clone()) {
                    return Err(EvalError::UndefinedVariable { line: *line, name: name.clone() });
                }
                Ok(v)
            }
            Expr::CompoundAssign { name, op, value, line } => {
                let cur = env
                    .get(name)
                    .ok_or_else(|| EvalError::UndefinedVariable { line: *line, name: name.clone() })?;
                let rhs = self.eval_expr(value, env)?;
                let new_val = apply_binary_op(op, cur, rhs, *line)?;
                env.update(name, new_val.clone());
                Ok(new_val)
            }
            Expr::Increment { name, line } => self.step_var(name, 1.0, env, *line),
            Expr::Decrement { name, line } => self.step_var(name, -1.0, env, *line),
            Expr::Call { name, args, line } => {
                let arg_vals = args
                    .iter()
                    .map(|e| self.eval_expr(e, env))
                    .collect::<Result<Vec<_>, _>>()?;
                match env.get(name) {
                    Some(Value::Function(fndef)) => self.call_function(&fndef, arg_vals),
                    Some(Value::NativeFn(module, func)) => lookup_native(module)
                        .and_then(|m| m.call(func, &arg_vals))
                        .ok_or_else(|| EvalError::UnknownModuleFunction {
                            line: *line,
                            module: module.to_string(),
                            name: func.to_string(),
                        }),
                    Some(_) => Err(EvalError::NotCallable { line: *line, name: name.clone() }),
                    None => Err(EvalError::UndefinedVariable { line: *line, name: name.clone() }),
                }
            }
            Expr::MethodCall { object, method, args, line } => {
                let obj = self.eval_expr(object, env)?;
                let arg_vals = args
                    .iter()
                    .map(|e| self.eval_expr(e, env))
                    .collect::<Result<Vec<_>, _>>()?;
                self.dispatch_method_call(obj, method, arg_vals, *line)
            }
            Expr::New { class_name, args, line } => match env.get(class_name) {
                Some(Value::Class(cls)) => self.instantiate(&cls, args, env),
                _ => Err(EvalError::NotAClass { line: *line, name: class_name.clone() }),
            },
            Expr::SuperCall { args, line } => self.super_call(args, env, *line),
            Expr::PropertyGet { object, name, line } => {
                let obj = self.eval_expr(object, env)?;
                match obj {
                    Value::Instance(inst) => Ok(inst.fields.get(name).unwrap_or(Value::Null)),
                    Value::UserModule(module_env) => Ok(module_env.get(name).unwrap_or(Value::Null)),
                    _ => Err(EvalError::PropertyOnNonObject { line: *line, name: name.clone() }),
                }
            }
            Expr::PropertySet { object, name, value, line } => {
                let obj = self.eval_expr(object, env)?;
                let v = self.eval_expr(value, env)?;
                match obj {
                    Value::Instance(inst) => {
                        inst.fields.define(name.clone(), v.clone());
                        Ok(v)
                    }
                    _ => Err(EvalError::PropertyOnNonObject { line: *line, name: name.clone() }),
                }
            }
            Expr::Typeof { operand, .. } => {
                let v = self.eval_expr(operand, env)?;
                Ok(Value::Str(v.type_name().to_string()))
            }
            Expr::Instanceof { object, class_name, line } => {
                let v = self.eval_expr(object, env)?;
                let rhs_cls = match env.get(class_name) {
                    Some(Value::Class(cls)) => cls,
                    _ => {
                        return Err(EvalError::UnknownParentClass {
                            line: *line,
                            name: class_name.clone(),
                        })
                    }
                };
                match v {
                    Value::Instance(inst) => Ok(Value::Bool(inst.class.is_or_descends_from(&rhs_cls))),
                    _ => Ok(Value::Bool(false)),
                }
            }
            Expr::ArrayLiteral { elements, .. } => {
                let vals = elements
                    .iter()
                    .map(|e| self.eval_expr(e, env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(vals))
            }
            Expr::Index { object, index, line } => {
                let obj = self.eval_expr(object, env)?;
                let idx = self.eval_expr(index, env)?;
                match (&obj, &idx) {
                    (Value::Array(items), Value::Number(n)) => {
                        let i = *n as i64;
                        if i < 0 {
                            Ok(Value::Null)
                        } else {
                            Ok(items.borrow().get(i as usize).cloned().unwrap_or(Value::Null))
                        }
                    }
                    _ => Err(EvalError::TypeMismatch {
                        line: *line,
                        op: "index".into(),
                        lhs: obj.type_name().into(),
                        rhs: idx.type_name().into(),
                    }),
                }
            }
            Expr::IndexSet { object, index, value, line } => {
                let obj = self.eval_expr(object, env)?;
                let idx = self.eval_expr(index, env)?;
                let v = self.eval_expr(value, env)?;
                match (&obj, &idx) {
                    (Value::Array(items), Value::Number(n)) => {
                        let i = *n as i64;
                        if i < 0 {
                            return Ok(v);
                        }
                        let ui = i as usize;
                        let mut b = items.borrow_mut();
                        if ui < b.len() {
                            b[ui] = v.clone();
                        } else {
                            // Assignment past the end grows the array with
                            // nulls, same as a sequence of pushes would.
                            b.resize(ui, Value::Null);
                            b.push(v.clone());
                        }
                        Ok(v)
                    }
                    _ => Err(EvalError::TypeMismatch {
                        line: *line,
                        op: "index-set".into(),
                        lhs: obj.type_name().into(),
                        rhs: idx.type_name().into(),
                    }),
                }
            }
            Expr::Input { prompt } => {
                use std::io::Write as _;
                if let Some(p) = prompt {
                    let v = self.eval_expr(p, env)?;
                    print!("{v}");
                    let _ = std::io::stdout().flush();
                }
                let mut line = String::new();
                match std::io::stdin().read_line(&mut line) {
                    Ok(_) => Ok(Value::Str(line.trim_end_matches(['\n', '\r']).to_string())),
                    Err(_) => Ok(Value::Str(String::new())),
                }
            }
            Expr::Spawn { call, .. } => {
                let result = self.eval_expr(call, env)?;
                Ok(Value::Future(Rc::new(result)))
            }
            Expr::Await { operand, .. } => {
                let v = self.eval_expr(operand, env)?;
                match v {
                    Value::Future(inner) => Ok((*inner).clone()),
                    other => Ok(other),
                }
            }
        }
    }

    fn step_var(&self, name: &str, delta: f64, env: &Rc<Environment>, line: usize) -> Result<Value, EvalError> {
        let cur = env
            .get(name)
            .ok_or_else(|| EvalError::UndefinedVariable { line, name: name.to_string() })?;
        match cur {
            Value::Number(n) => {
                env.update(name, Value::Number(n + delta));
                Ok(Value::Null)
            }
            other => Err(EvalError::TypeMismatch {
                line,
                op: if delta > 0.0 { "++".into() } else { "--".into() },
                lhs: other.type_name().into(),
                rhs: "number".into(),
            }),
        }
    }

    fn bind_params(&self, fndef: &FnDef, args: Vec<Value>, env: &Rc<Environment>) -> Result<(), EvalError> {
        for (i, param) in fndef.params.iter().enumerate() {
            let value = if i < args.len() {
                args[i].clone()
            } else if let Some(default_expr) = &param.default {
                self.eval_expr(default_expr, env)?
            } else {
                Value::Null
            };
            env.define(param.name.clone(), value);
        }
        Ok(())
    }

    fn call_function(&self, fndef: &Rc<FnDef>, args: Vec<Value>) -> Result<Value, EvalError> {
        let call_env = Environment::with_parent(fndef.closure.clone());
        self.bind_params(fndef, args, &call_env)?;
        let result = self.exec_block_in(&fndef.body, &call_env)?;
        Ok(match result {
            Value::Return(inner) => *inner,
            _ => Value::Null,
        })
    }

    fn dispatch_method_call(&self, obj: Value, method: &str, args: Vec<Value>, line: usize) -> Result<Value, EvalError> {
        match obj {
            Value::Instance(inst) => self.dispatch_instance_method(&inst, method, args, line),
            Value::Array(items) => match method {
                "push" => {
                    items.borrow_mut().push(args.into_iter().next().unwrap_or(Value::Null));
                    Ok(Value::Null)
                }
                _ => Err(EvalError::UnknownMethod {
                    line,
                    method: method.to_string(),
                    class: "array".into(),
                }),
            },
            Value::NativeModule(modname) => lookup_native(modname)
                .and_then(|m| m.call(method, &args))
                .ok_or_else(|| EvalError::UnknownModuleFunction {
                    line,
                    module: modname.to_string(),
                    name: method.to_string(),
                }),
            Value::UserModule(exports) => match exports.get(method) {
                Some(Value::Function(fndef)) => self.call_function(&fndef, args),
                Some(_) => Err(EvalError::NotCallable { line, name: method.to_string() }),
                None => Err(EvalError::UnknownModuleFunction {
                    line,
                    module: "<module>".into(),
                    name: method.to_string(),
                }),
            },
            other => Err(EvalError::PropertyOnNonObject {
                line,
                name: format!("{method} (on a {})", other.type_name()),
            }),
        }
    }

    fn dispatch_instance_method(&self, inst: &Rc<InstanceData>, method: &str, args: Vec<Value>, line: usize) -> Result<Value, EvalError> {
        let Some((method_val, owner)) = inst.class.find_method_with_owner(method) else {
            return Err(EvalError::UnknownMethod {
                line,
                method: method.to_string(),
                class: inst.class.name.clone(),
            });
        };
        let Value::Function(fndef) = method_val else {
            return Err(EvalError::UnknownMethod {
                line,
                method: method.to_string(),
                class: inst.class.name.clone(),
            });
        };
        let call_env = Environment::with_parent(fndef.closure.clone());
        call_env.define("this", Value::Instance(inst.clone()));
        if let Some(parent) = owner.parent.clone() {
            call_env.define("__super__", Value::Class(parent));
        }
        self.bind_params(&fndef, args, &call_env)?;
        let result = self.exec_block_in(&fndef.body, &call_env)?;
        Ok(match result {
            Value::Return(inner) => *inner,
            _ => Value::Null,
        })
    }

    /// `new C(args)` always yields the freshly built instance, discarding
    /// whatever `init` returns — `init`'s job is to mutate fields, not to
    /// pick the constructor's result.
    fn instantiate(&self, cls: &Rc<ClassDef>, args: &[Expr], env: &Rc<Environment>) -> Result<Value, EvalError> {
        let arg_vals = args
            .iter()
            .map(|e| self.eval_expr(e, env))
            .collect::<Result<Vec<_>, _>>()?;
        let fields = Environment::new();
        let inst = Rc::new(InstanceData { class: cls.clone(), fields });
        let inst_val = Value::Instance(inst.clone());
        if let Some((init_val, _owner)) = cls.find_method_with_owner("init") {
            if let Value::Function(fndef) = init_val {
                let call_env = Environment::with_parent(fndef.closure.clone());
                call_env.define("this", inst_val.clone());
                // `new`'s `__super__` is the instantiated class's own
                // parent, not the parent of whichever ancestor happened to
                // define `init` — unlike ordinary method dispatch.
                if let Some(parent) = cls.parent.clone() {
                    call_env.define("__super__", Value::Class(parent));
                }
                self.bind_params(&fndef, arg_vals, &call_env)?;
                self.exec_block_in(&fndef.body, &call_env)?;
            }
        }
        Ok(inst_val)
    }

    fn super_call(&self, args: &[Expr], env: &Rc<Environment>, line: usize) -> Result<Value, EvalError> {
        let this_val = env.get("this").ok_or(EvalError::ThisOutsideMethod { line })?;
        let super_val = env.get("__super__").ok_or(EvalError::SuperOutsideClass { line })?;
        let Value::Class(parent_cls) = super_val else {
            return Err(EvalError::SuperOutsideClass { line });
        };
        let arg_vals = args
            .iter()
            .map(|e| self.eval_expr(e, env))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some((init_val, owner)) = parent_cls.find_method_with_owner("init") {
            if let Value::Function(fndef) = init_val {
                let call_env = Environment::with_parent(fndef.closure.clone());
                call_env.define("this", this_val.clone());
                if let Some(grandparent) = owner.parent.clone() {
                    call_env.define("__super__", Value::Class(grandparent));
                }
                self.bind_params(&fndef, arg_vals, &call_env)?;
                let result = self.exec_block_in(&fndef.body, &call_env)?;
                return Ok(match result {
                    Value::Return(inner) => *inner,
                    _ => Value::Null,
                });
            }
        }
        Ok(Value::Null)
    }

    fn do_import(&self, path: &str, form: &ImportForm, env: &Rc<Environment>, line: usize) -> Result<(), EvalError> {
        if let Some(native) = lookup_native(path) {
            match form {
                ImportForm::Plain => env.define(path.to_string(), Value::NativeModule(native.name)),
                ImportForm::Aliased(alias) => env.define(alias.clone(), Value::NativeModule(native.name)),
                ImportForm::Selective(names) => {
                    for n in names {
                        let func_name = native.names().into_iter().find(|f| f == n).ok_or_else(|| {
                            EvalError::UnknownModuleFunction {
                                line,
                                module: path.to_string(),
                                name: n.clone(),
                            }
                        })?;
                        env.define(n.clone(), Value::NativeFn(native.name, func_name));
                    }
                }
                ImportForm::Wildcard => {
                    for n in native.names() {
                        env.define(n.to_string(), Value::NativeFn(native.name, n));
                    }
                }
            }
            return Ok(());
        }

        let base_dir = self.source_dir.borrow().clone();
        let file_path = ModuleLoader::resolve_path(&base_dir, path);
        if !file_path.is_file() {
            return Err(EvalError::ModuleNotFound { path: file_path.display().to_string() });
        }

        if self.modules.begin_load(&file_path, line)? {
            self.load_module_file(&file_path)?;
        }

        let exports = self
            .modules
            .cached_exports(&file_path)
            .expect("just finished loading this module");

        match form {
            ImportForm::Plain => env.define(path.to_string(), Value::UserModule(exports)),
            ImportForm::Aliased(alias) => env.define(alias.clone(), Value::UserModule(exports)),
            ImportForm::Selective(names) => {
                for n in names {
                    let v = exports.get(n).ok_or_else(|| EvalError::NotExported {
                        line,
                        module: path.to_string(),
                        name: n.clone(),
                    })?;
                    env.define(n.clone(), v);
                }
            }
            ImportForm::Wildcard => {
                for (name, value) in exports.entries() {
                    env.define(name, value);
                }
            }
        }
        Ok(())
    }

    /// Parses and evaluates a module file in a fresh global scope, then
    /// caches its exported bindings by resolved path. `import`s nested
    /// inside the module resolve relative to the module's own directory,
    /// so the working source directory is swapped for the duration and
    /// restored afterward even on error.
    fn load_module_file(&self, file_path: &Path) -> Result<(), EvalError> {
        let source = std::fs::read_to_string(file_path)
            .map_err(|_| EvalError::ModuleNotFound { path: file_path.display().to_string() })?;
        let (program, lex_errors, parse_errors) = crate::parser::parse_source(&source);
        if let Some(e) = lex_errors.first() {
            return Err(EvalError::ModuleLoadError {
                line: 0,
                path: file_path.display().to_string(),
                message: e.to_string(),
            });
        }
        if let Some(e) = parse_errors.first() {
            return Err(EvalError::ModuleLoadError {
                line: 0,
                path: file_path.display().to_string(),
                message: e.to_string(),
            });
        }

        let module_dir = file_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let previous_dir = self.source_dir.replace(module_dir);

        let module_env = Environment::new();
        let result = (|| {
            for stmt in &program {
                self.exec_stmt(stmt, &module_env)?;
            }
            Ok::<_, EvalError>(())
        })();

        self.source_dir.replace(previous_dir);
        result?;

        let exports = Environment::new();
        for name in crate::modules::exported_names(&program) {
            if let Some(v) = module_env.get(&name) {
                exports.define(name, v);
            }
        }
        self.modules.finish_load(file_path, exports);
        Ok(())
    }
}

fn apply_binary_op(op: &str, l: Value, r: Value, line: usize) -> Result<Value, EvalError> {
    match op {
        "+" => match (&l, &r) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{l}{r}"))),
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            _ => Err(type_mismatch(op, &l, &r, line)),
        },
        "-" => numeric(op, l, r, line, |a, b| a - b),
        "*" => numeric(op, l, r, line, |a, b| a * b),
        "/" => match (&l, &r) {
            (Value::Number(_), Value::Number(b)) if *b == 0.0 => Err(EvalError::DivisionByZero { line }),
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
            _ => Err(type_mismatch(op, &l, &r, line)),
        },
        "%" => match (&l, &r) {
            (Value::Number(_), Value::Number(b)) if *b as i64 == 0 => Err(EvalError::DivisionByZero { line }),
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(((*a as i64) % (*b as i64)) as f64)),
            _ => Err(type_mismatch(op, &l, &r, line)),
        },
        "==" => Ok(Value::Bool(l == r)),
        "!=" => Ok(Value::Bool(l != r)),
        "<" => compare(op, l, r, line, |a, b| a < b),
        ">" => compare(op, l, r, line, |a, b| a > b),
        "<=" => compare(op, l, r, line, |a, b| a <= b),
        ">=" => compare(op, l, r, line, |a, b| a >= b),
        _ => Err(type_mismatch(op, &l, &r, line)),
    }
}

fn numeric(op: &str, l: Value, r: Value, line: usize, f: impl Fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    match (&l, &r) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(*a, *b))),
        _ => Err(type_mismatch(op, &l, &r, line)),
    }
}

fn compare(op: &str, l: Value, r: Value, line: usize, f: impl Fn(f64, f64) -> bool) -> Result<Value, EvalError> {
    match (&l, &r) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(f(*a, *b))),
        _ => Err(type_mismatch(op, &l, &r, line)),
    }
}

fn type_mismatch(op: &str, l: &Value, r: &Value, line: usize) -> EvalError {
    EvalError::TypeMismatch {
        line,
        op: op.to_string(),
        lhs: l.type_name().into(),
        rhs: r.type_name().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn run(src: &str) -> Result<(), EvalError> {
        let (program, lex_errs, parse_errs) = parse_source(src);
        assert!(lex_errs.is_empty(), "{lex_errs:?}");
        assert!(parse_errs.is_empty(), "{parse_errs:?}");
        Interpreter::new(PathBuf::from(".")).run(&program)
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert!(run("print(2*9-6/3*5)").is_ok());
    }

    #[test]
    fn test_function_call() {
        assert!(run("fn add(a,b){ return a+b } print(add(3,4))").is_ok());
    }

    #[test]
    fn test_undefined_variable_errors() {
        let err = run("print(nope)").unwrap_err();
        assert!(matches!(err, EvalError::UndefinedVariable { .. }));
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        let err = run("print(1/0)").unwrap_err();
        assert!(matches!(err, EvalError::DivisionByZero { .. }));
    }

    #[test]
    fn test_modulo_truncates_like_integers() {
        let (program, _, _) = parse_source("var x = 7 % 2");
        let interp = Interpreter::new(PathBuf::from("."));
        interp.run(&program).unwrap();
    }

    #[test]
    fn test_and_or_return_last_operand() {
        let (program, _, _) = parse_source("var a = 0 and 5\nvar b = 3 or 9\nprint(a)\nprint(b)");
        assert!(Interpreter::new(PathBuf::from(".")).run(&program).is_ok());
    }

    #[test]
    fn test_class_inheritance_and_super() {
        let src = r#"
            class Animal {
                fn init(name) { this.name = name }
                fn speak() { return this.name + " makes a sound" }
            }
            class Dog extends Animal {
                fn init(name) {
                    super(name)
                }
                fn speak() {
                    return this.name
                }
            }
            var d = new Dog("Rex")
            print(d.speak())
            print(d instanceof Animal)
        "#;
        assert!(run(src).is_ok());
    }

    #[test]
    fn test_array_push_and_index() {
        let src = "var xs = [1,2,3]\nxs.push(4)\nprint(xs[3])\nprint(xs[99])";
        assert!(run(src).is_ok());
    }

    #[test]
    fn test_for_in_over_array() {
        assert!(run("for v in [10,20,30] { print(v) }").is_ok());
    }

    #[test]
    fn test_string_concatenation_with_number() {
        assert!(run(r#"print("n=" + 5)"#).is_ok());
    }

    #[test]
    fn test_increment_is_a_statement_level_effect() {
        assert!(run("var i = 0\ni++\nprint(i)").is_ok());
    }

    #[test]
    fn test_continue_still_runs_for_update() {
        let src = "var out = 0\nfor (var i = 0; i < 5; i = i + 1) { if (i == 2) { continue } out = out + i }\nprint(out)";
        assert!(run(src).is_ok());
    }
}
