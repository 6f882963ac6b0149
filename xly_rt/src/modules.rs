// ABOUTME: math/string/io native functions, restated against the XlyVal C-ABI representation

use crate::{to_display_string, XlyVal};
use std::time::{SystemTime, UNIX_EPOCH};

fn arg_num(args: &[&XlyVal], i: usize) -> f64 {
    match args.get(i) {
        Some(XlyVal::Number(n)) => *n,
        _ => 0.0,
    }
}

fn arg_str(args: &[&XlyVal], i: usize) -> String {
    match args.get(i) {
        Some(XlyVal::Str(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Same xorshift PRNG the interpreter's `math.random` uses, seeded once from
/// the system clock — no `rand` crate in this workspace's dependency stack.
fn pseudo_random() -> f64 {
    use std::cell::Cell;
    thread_local! {
        static STATE: Cell<u64> = Cell::new(0);
    }
    STATE.with(|cell| {
        let mut state = cell.get();
        if state == 0 {
            state = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x2545F4914F6CDD1D)
                | 1;
        }
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        cell.set(x);
        (x >> 11) as f64 / (1u64 << 53) as f64
    })
}

fn math_call(fn_name: &str, args: &[&XlyVal]) -> Option<XlyVal> {
    let n = |v: f64| Some(XlyVal::Number(v));
    match fn_name {
        "abs" => n(arg_num(args, 0).abs()),
        "sqrt" => n(arg_num(args, 0).sqrt()),
        "pow" => n(arg_num(args, 0).powf(arg_num(args, 1))),
        "floor" => n(arg_num(args, 0).floor()),
        "ceil" => n(arg_num(args, 0).ceil()),
        "round" => n(arg_num(args, 0).round()),
        "max" => n(arg_num(args, 0).max(arg_num(args, 1))),
        "min" => n(arg_num(args, 0).min(arg_num(args, 1))),
        "sin" => n(arg_num(args, 0).sin()),
        "cos" => n(arg_num(args, 0).cos()),
        "log" => n(arg_num(args, 0).ln()),
        "random" => n(pseudo_random()),
        _ => None,
    }
}

fn string_call(fn_name: &str, args: &[&XlyVal]) -> Option<XlyVal> {
    match fn_name {
        "len" => Some(XlyVal::Number(arg_str(args, 0).chars().count() as f64)),
        "upper" => Some(XlyVal::Str(arg_str(args, 0).to_uppercase())),
        "lower" => Some(XlyVal::Str(arg_str(args, 0).to_lowercase())),
        "contains" => Some(XlyVal::Bool(arg_str(args, 0).contains(&arg_str(args, 1)))),
        "repeat" => {
            let n = arg_num(args, 1) as i64;
            Some(XlyVal::Str(if n <= 0 {
                String::new()
            } else {
                arg_str(args, 0).repeat(n as usize)
            }))
        }
        "reverse" => Some(XlyVal::Str(arg_str(args, 0).chars().rev().collect())),
        "trim" => Some(XlyVal::Str(arg_str(args, 0).trim().to_string())),
        "replace" => Some(XlyVal::Str(
            arg_str(args, 0).replace(&arg_str(args, 1), &arg_str(args, 2)),
        )),
        "substr" => {
            let s = arg_str(args, 0);
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let mut start = arg_num(args, 1) as i64;
            if start < 0 {
                start = 0;
            }
            if start >= len {
                return Some(XlyVal::Str(String::new()));
            }
            let mut count = if args.len() >= 3 { arg_num(args, 2) as i64 } else { len - start };
            if start + count > len {
                count = len - start;
            }
            let slice: String = chars[start as usize..(start + count) as usize].iter().collect();
            Some(XlyVal::Str(slice))
        }
        _ => None,
    }
}

fn io_call(fn_name: &str, args: &[&XlyVal]) -> Option<XlyVal> {
    use std::io::Write;
    match fn_name {
        "write" => {
            for v in args {
                print!("{}", to_display_string(v));
            }
            let _ = std::io::stdout().flush();
            Some(XlyVal::Null)
        }
        "writeln" => {
            for (i, v) in args.iter().enumerate() {
                if i > 0 {
                    print!(" ");
                }
                print!("{}", to_display_string(v));
            }
            println!();
            Some(XlyVal::Null)
        }
        "read" => {
            if let Some(v) = args.first() {
                print!("{}", to_display_string(v));
                let _ = std::io::stdout().flush();
            }
            let mut line = String::new();
            match std::io::stdin().read_line(&mut line) {
                Ok(_) => Some(XlyVal::Str(line.trim_end_matches(['\n', '\r']).to_string())),
                Err(_) => Some(XlyVal::Str(String::new())),
            }
        }
        _ => None,
    }
}

/// Resolves a `module.function(args)` call. `args` are borrowed refs to
/// already-dereferenced values; the caller owns allocating the result.
pub fn dispatch(module: &str, fn_name: &str, args: &[&XlyVal]) -> Option<XlyVal> {
    match module {
        "math" => math_call(fn_name, args),
        "string" => string_call(fn_name, args),
        "io" => io_call(fn_name, args),
        _ => {
            eprintln!("[xenly runtime] unknown module '{module}'");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_dispatch() {
        let four = XlyVal::Number(-4.0);
        let r = dispatch("math", "abs", &[&four]).unwrap();
        assert!(matches!(r, XlyVal::Number(n) if n == 4.0));
    }

    #[test]
    fn test_string_dispatch() {
        let s = XlyVal::Str("hi".to_string());
        let r = dispatch("string", "upper", &[&s]).unwrap();
        assert!(matches!(r, XlyVal::Str(ref s) if s == "HI"));
    }

    #[test]
    fn test_unknown_module_returns_none() {
        assert!(dispatch("os", "exit", &[]).is_none());
    }
}
