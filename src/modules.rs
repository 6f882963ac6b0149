// ABOUTME: Native module registry (math/string/io) and the user-module loader

use crate::ast::{ImportForm, Program, Stmt};
use crate::env::Environment;
use crate::error::EvalError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashSet;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A native module is just a flat table of name -> builtin function.
pub struct NativeModule {
    pub name: &'static str,
    pub functions: Vec<(&'static str, fn(&[Value]) -> Value)>,
}

impl NativeModule {
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        self.functions
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| f(args))
    }

    pub fn has(&self, name: &str) -> bool {
        self.functions.iter().any(|(n, _)| *n == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.functions.iter().map(|(n, _)| *n).collect()
    }
}

/// Looks up one of the three builtin native modules by name.
pub fn lookup_native(name: &str) -> Option<NativeModule> {
    match name {
        "math" => Some(module_math()),
        "string" => Some(module_string()),
        "io" => Some(module_io()),
        _ => None,
    }
}

fn arg_num(args: &[Value], i: usize) -> f64 {
    match args.get(i) {
        Some(Value::Number(n)) => *n,
        _ => 0.0,
    }
}

fn arg_str(args: &[Value], i: usize) -> String {
    match args.get(i) {
        Some(Value::Str(s)) => s.clone(),
        _ => String::new(),
    }
}

fn module_math() -> NativeModule {
    NativeModule {
        name: "math",
        functions: vec![
            ("abs", |a| Value::Number(arg_num(a, 0).abs())),
            ("sqrt", |a| Value::Number(arg_num(a, 0).sqrt())),
            ("pow", |a| Value::Number(arg_num(a, 0).powf(arg_num(a, 1)))),
            ("floor", |a| Value::Number(arg_num(a, 0).floor())),
            ("ceil", |a| Value::Number(arg_num(a, 0).ceil())),
            ("round", |a| Value::Number(arg_num(a, 0).round())),
            ("max", |a| Value::Number(arg_num(a, 0).max(arg_num(a, 1)))),
            ("min", |a| Value::Number(arg_num(a, 0).min(arg_num(a, 1)))),
            ("sin", |a| Value::Number(arg_num(a, 0).sin())),
            ("cos", |a| Value::Number(arg_num(a, 0).cos())),
            ("log", |a| Value::Number(arg_num(a, 0).ln())),
            ("random", |_| Value::Number(pseudo_random())),
        ],
    }
}

/// A small xorshift PRNG seeded from the system clock. `original_source`
/// seeds libc's `rand()` once from `time(NULL)`; we do the same thing
/// without reaching for a `rand` crate dependency the rest of the codebase
/// has no other use for.
fn pseudo_random() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    thread_local! {
        static STATE: RefCell<u64> = RefCell::new(0);
    }
    STATE.with(|cell| {
        let mut state = cell.borrow_mut();
        if *state == 0 {
            *state = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x2545F4914F6CDD1D)
                | 1;
        }
        let mut x = *state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        *state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    })
}

fn module_string() -> NativeModule {
    NativeModule {
        name: "string",
        functions: vec![
            ("len", |a| Value::Number(arg_str(a, 0).chars().count() as f64)),
            ("upper", |a| Value::Str(arg_str(a, 0).to_uppercase())),
            ("lower", |a| Value::Str(arg_str(a, 0).to_lowercase())),
            ("contains", |a| Value::Bool(arg_str(a, 0).contains(&arg_str(a, 1)))),
            ("repeat", |a| {
                let n = arg_num(a, 1) as i64;
                if n <= 0 {
                    Value::Str(String::new())
                } else {
                    Value::Str(arg_str(a, 0).repeat(n as usize))
                }
            }),
            ("reverse", |a| Value::Str(arg_str(a, 0).chars().rev().collect())),
            ("trim", |a| Value::Str(arg_str(a, 0).trim().to_string())),
            ("replace", |a| Value::Str(arg_str(a, 0).replace(&arg_str(a, 1), &arg_str(a, 2)))),
            ("substr", |a| {
                let s = arg_str(a, 0);
                let chars: Vec<char> = s.chars().collect();
                let len = chars.len() as i64;
                let mut start = arg_num(a, 1) as i64;
                if start < 0 {
                    start = 0;
                }
                if start >= len {
                    return Value::Str(String::new());
                }
                let mut count = if a.len() >= 3 { arg_num(a, 2) as i64 } else { len - start };
                if start + count > len {
                    count = len - start;
                }
                let slice: String = chars[start as usize..(start + count) as usize].iter().collect();
                Value::Str(slice)
            }),
        ],
    }
}

fn module_io() -> NativeModule {
    NativeModule {
        name: "io",
        functions: vec![
            ("write", |a| {
                for v in a {
                    print!("{v}");
                }
                let _ = std::io::stdout().flush();
                Value::Null
            }),
            ("writeln", |a| {
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        print!(" ");
                    }
                    print!("{v}");
                }
                println!();
                Value::Null
            }),
            ("read", |a| {
                if let Some(v) = a.first() {
                    print!("{v}");
                    let _ = std::io::stdout().flush();
                }
                let mut line = String::new();
                match std::io::stdin().read_line(&mut line) {
                    Ok(_) => Value::Str(line.trim_end_matches(['\n', '\r']).to_string()),
                    Err(_) => Value::Str(String::new()),
                }
            }),
        ],
    }
}

/// Loads and caches user-authored `.xe` modules, resolved relative to the
/// directory of whichever file is importing them.
///
/// Grounded in `do_import`: native registry first, then a `<dir>/<name>.xe`
/// fallback; circular imports are rejected via a stack of in-progress paths,
/// and a module is parsed and evaluated at most once per resolved path.
pub struct ModuleLoader {
    loading: RefCell<Vec<PathBuf>>,
    loaded: RefCell<HashSet<PathBuf>>,
    pub exports: RefCell<std::collections::HashMap<PathBuf, Rc<Environment>>>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        ModuleLoader {
            loading: RefCell::new(Vec::new()),
            loaded: RefCell::new(HashSet::new()),
            exports: RefCell::new(std::collections::HashMap::new()),
        }
    }

    pub fn resolve_path(base_dir: &Path, name: &str) -> PathBuf {
        base_dir.join(format!("{name}.xe"))
    }

    pub fn begin_load(&self, path: &Path, line: usize) -> Result<bool, EvalError> {
        let canon = path.to_path_buf();
        if self.loading.borrow().iter().any(|p| p == &canon) {
            return Err(EvalError::CircularImport {
                line,
                path: canon.display().to_string(),
            });
        }
        if self.loaded.borrow().contains(&canon) {
            return Ok(false); // already loaded; caller reuses cached exports
        }
        self.loading.borrow_mut().push(canon);
        Ok(true)
    }

    pub fn finish_load(&self, path: &Path, exports: Rc<Environment>) {
        let canon = path.to_path_buf();
        self.loading.borrow_mut().retain(|p| p != &canon);
        self.loaded.borrow_mut().insert(canon.clone());
        self.exports.borrow_mut().insert(canon, exports);
    }

    pub fn cached_exports(&self, path: &Path) -> Option<Rc<Environment>> {
        self.exports.borrow().get(path).cloned()
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Filters a module's top-level statements down to the ones marked `export`,
/// returning their bare names so the caller can copy just those bindings
/// out of the freshly-evaluated module scope.
pub fn exported_names(program: &Program) -> Vec<String> {
    program
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Export(inner) => match inner.as_ref() {
                Stmt::FnDecl { name, .. } => Some(name.clone()),
                Stmt::ClassDecl { name, .. } => Some(name.clone()),
                Stmt::VarDecl { name, .. } => Some(name.clone()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Which names an import form actually binds in the importer's scope.
pub fn names_to_bind(form: &ImportForm, all_exports: &[String]) -> Vec<String> {
    match form {
        ImportForm::Wildcard => all_exports.to_vec(),
        ImportForm::Selective(names) => names.clone(),
        ImportForm::Plain | ImportForm::Aliased(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_module_functions() {
        let m = module_math();
        assert_eq!(m.call("abs", &[Value::Number(-4.0)]), Some(Value::Number(4.0)));
        assert_eq!(m.call("max", &[Value::Number(1.0), Value::Number(5.0)]), Some(Value::Number(5.0)));
        assert!(m.has("random"));
    }

    #[test]
    fn test_string_module_functions() {
        let m = module_string();
        assert_eq!(m.call("upper", &[Value::Str("hi".into())]), Some(Value::Str("HI".into())));
        assert_eq!(m.call("len", &[Value::Str("hello".into())]), Some(Value::Number(5.0)));
        assert_eq!(
            m.call("replace", &[Value::Str("aXbXc".into()), Value::Str("X".into()), Value::Str("-".into())]),
            Some(Value::Str("a-b-c".into()))
        );
        assert_eq!(
            m.call("substr", &[Value::Str("hello world".into()), Value::Number(6.0)]),
            Some(Value::Str("world".into()))
        );
    }

    #[test]
    fn test_lookup_native_rejects_dead_modules() {
        assert!(lookup_native("math").is_some());
        assert!(lookup_native("string").is_some());
        assert!(lookup_native("io").is_some());
        assert!(lookup_native("array").is_none());
        assert!(lookup_native("os").is_none());
        assert!(lookup_native("type").is_none());
    }

    #[test]
    fn test_module_loader_detects_circular_import() {
        let loader = ModuleLoader::new();
        let path = PathBuf::from("/tmp/a.xe");
        assert!(loader.begin_load(&path, 1).unwrap());
        let err = loader.begin_load(&path, 2).unwrap_err();
        assert!(matches!(err, EvalError::CircularImport { .. }));
    }

    #[test]
    fn test_module_loader_loads_once() {
        let loader = ModuleLoader::new();
        let path = PathBuf::from("/tmp/b.xe");
        assert!(loader.begin_load(&path, 1).unwrap());
        loader.finish_load(&path, Environment::new());
        assert!(!loader.begin_load(&path, 2).unwrap());
    }

    #[test]
    fn test_exported_names_filters_non_exported() {
        let program = vec![
            Stmt::Export(Box::new(Stmt::FnDecl {
                name: "add".into(),
                params: vec![],
                body: vec![],
                is_async: false,
            })),
            Stmt::VarDecl { name: "secret".into(), value: None },
        ];
        assert_eq!(exported_names(&program), vec!["add".to_string()]);
    }
}
