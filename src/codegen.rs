// ABOUTME: AST -> x86-64 AT&T assembly emitter (System V AMD64 ABI) for the `xenlyc` backend

use crate::ast::{Expr, Program, Stmt};
use crate::error::CodegenError;
use std::fmt::Write as _;

/// Every `emit_expr` leaves exactly one `XlyVal*` in `%rax`. Every `emit_stmt`
/// leaves `%rsp` unchanged from where it was on entry (push/pop discipline,
/// or sub/add pairs when the push count is known up front). `%rsp` must be
/// 16-byte aligned before any `call`; a lone `pushq` is never left dangling
/// at a call site.
pub struct Codegen {
    out: String,
    label_seq: usize,

    vars: Vec<VarSlot>,
    scope_depth: i32,
    frame_offset: i32,

    strings: Vec<(String, String)>,

    brk_labels: Vec<String>,
    cnt_labels: Vec<String>,

    funcs: Vec<FnDeclRef>,

    warnings: Vec<CodegenError>,
}

struct VarSlot {
    name: String,
    offset: i32,
    depth: i32,
}

/// A top-level function declaration stashed during main-body emission and
/// flushed out after `main`'s `ret`.
struct FnDeclRef {
    name: String,
    params: Vec<crate::ast::Param>,
    body: Vec<Stmt>,
}

impl Codegen {
    pub fn new() -> Self {
        Codegen {
            out: String::new(),
            label_seq: 0,
            vars: Vec::new(),
            scope_depth: 0,
            frame_offset: 0,
            strings: Vec::new(),
            brk_labels: Vec::new(),
            cnt_labels: Vec::new(),
            funcs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[CodegenError] {
        &self.warnings
    }

    fn emit(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn emitf(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = writeln!(self.out, "{args}");
    }

    fn fresh_label(&mut self, tag: &str) -> String {
        let n = self.label_seq;
        self.label_seq += 1;
        format!(".Lxly_{n}_{tag}")
    }

    fn fresh_plain_label(&mut self) -> String {
        let n = self.label_seq;
        self.label_seq += 1;
        format!(".Lxly_{n}")
    }

    fn intern_string(&mut self, text: &str) -> String {
        if let Some((_, lbl)) = self.strings.iter().find(|(t, _)| t == text) {
            return lbl.clone();
        }
        let lbl = format!(".Lxly_str_{}", self.strings.len());
        self.strings.push((text.to_string(), lbl.clone()));
        lbl
    }

    fn var_find(&self, name: &str) -> Option<i32> {
        self.vars.iter().rev().find(|v| v.name == name).map(|v| v.offset)
    }

    fn var_offset(&self, name: &str) -> i32 {
        self.var_find(name).unwrap_or(0)
    }

    /// Declare a local, idempotent within the same scope depth (a `for`
    /// loop re-entering its own block shouldn't grow the frame every time).
    fn var_declare(&mut self, name: &str) -> i32 {
        for v in self.vars.iter().rev() {
            if v.depth != self.scope_depth {
                break;
            }
            if v.name == name {
                return v.offset;
            }
        }
        self.frame_offset -= 8;
        let offset = self.frame_offset;
        self.vars.push(VarSlot {
            name: name.to_string(),
            offset,
            depth: self.scope_depth,
        });
        offset
    }

    fn scope_enter(&mut self) {
        self.scope_depth += 1;
    }

    fn scope_leave(&mut self) {
        while let Some(last) = self.vars.last() {
            if last.depth != self.scope_depth {
                break;
            }
            self.vars.pop();
        }
        self.scope_depth -= 1;
    }

    fn push_brk(&mut self, l: String) {
        self.brk_labels.push(l);
    }
    fn pop_brk(&mut self) {
        self.brk_labels.pop();
    }
    fn push_cnt(&mut self, l: String) {
        self.cnt_labels.push(l);
    }
    fn pop_cnt(&mut self) {
        self.cnt_labels.pop();
    }

    fn emit_load_double(&mut self, d: f64) {
        self.emit("    subq    $8, %rsp");
        self.emitf(format_args!("    movabsq ${}, %rax", d.to_bits()));
        self.emit("    movq    %rax, (%rsp)");
        self.emit("    movsd   (%rsp), %xmm0");
        self.emit("    addq    $8, %rsp");
    }

    // ---------------------------------------------------------------- expr

    fn emit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number(n) => {
                self.emit_load_double(*n);
                self.emit("    call    xly_num");
            }
            Expr::Str(s) => {
                let lbl = self.intern_string(s);
                self.emitf(format_args!("    leaq    {lbl}(%rip), %rdi"));
                self.emit("    call    xly_str");
            }
            Expr::Bool(b) => {
                self.emitf(format_args!("    movl    ${}, %edi", if *b { 1 } else { 0 }));
                self.emit("    call    xly_bool");
            }
            Expr::Null => self.emit("    call    xly_null"),
            Expr::Identifier(name) => {
                if let Some(off) = self.var_find(name) {
                    self.emitf(format_args!("    movq    {off}(%rbp), %rax"));
                } else {
                    self.emit("    call    xly_null");
                }
            }
            Expr::This => self.emit("    call    xly_null"),
            Expr::Binary { op, left, right, .. } => self.emit_binary(op, left, right),
            Expr::Unary { op, operand, .. } => {
                self.emit_expr(operand);
                self.emit("    movq    %rax, %rdi");
                self.emitf(format_args!(
                    "    call    {}",
                    if op == "-" { "xly_neg" } else { "xly_not" }
                ));
            }
            Expr::Assign { name, value, .. } => {
                self.emit_expr(value);
                let off = self.var_offset(name);
                self.emitf(format_args!("    movq    %rax, {off}(%rbp)"));
            }
            Expr::CompoundAssign { name, op, value, .. } => self.emit_compound_assign(name, op, value),
            Expr::Increment { name, .. } => self.emit_inc_dec(name, true),
            Expr::Decrement { name, .. } => self.emit_inc_dec(name, false),
            Expr::Call { name, args, line } => self.emit_call(name, args, *line),
            Expr::MethodCall { object, method, args, .. } => {
                // Module-function dispatch (`mod.fn(args)`); `object` must
                // be a bare module identifier for the native backend.
                if let Expr::Identifier(module) = object.as_ref() {
                    self.emit_module_call(module, method, args);
                } else {
                    self.emit("    call    xly_null");
                }
            }
            Expr::Typeof { operand, .. } => {
                self.emit_expr(operand);
                self.emit("    movq    %rax, %rdi");
                self.emit("    call    xly_typeof");
            }
            Expr::ArrayLiteral { elements, .. } => self.emit_array_literal(elements),
            Expr::Index { object, index, .. } => {
                self.emit_expr(object);
                self.emit("    pushq   %rax");
                self.emit_expr(index);
                self.emit("    movq    %rax, %rsi");
                self.emit("    popq    %rdi");
                self.emit("    call    xly_index");
            }
            // Constructs without a native-codegen counterpart in the
            // reference backend (classes/instances, user modules, async,
            // interactive input) fall back to `null`, same as its default case.
            Expr::New { .. }
            | Expr::SuperCall { .. }
            | Expr::PropertyGet { .. }
            | Expr::PropertySet { .. }
            | Expr::Instanceof { .. }
            | Expr::IndexSet { .. }
            | Expr::Input { .. }
            | Expr::Spawn { .. }
            | Expr::Await { .. } => self.emit("    call    xly_null"),
        }
    }

    fn emit_compound_assign(&mut self, name: &str, op: &str, rhs: &Expr) {
        let off = self.var_offset(name);
        self.emitf(format_args!("    movq    {off}(%rbp), %rax"));
        self.emit("    pushq   %rax");
        self.emit_expr(rhs);
        self.emit("    movq    %rax, %rsi");
        self.emit("    popq    %rdi");
        let fn_name = match op {
            "+=" => "xly_add",
            "-=" => "xly_sub",
            "*=" => "xly_mul",
            "/=" => "xly_div",
            _ => "xly_add",
        };
        self.emitf(format_args!("    call    {fn_name}"));
        self.emitf(format_args!("    movq    %rax, {off}(%rbp)"));
    }

    fn emit_binary(&mut self, op: &str, left: &Expr, right: &Expr) {
        if op == "and" {
            let lbl_end = self.fresh_label("and_end");
            let lbl_done = self.fresh_label("and_done");
            self.emit_expr(left);
            self.emit("    pushq   %rax");
            self.emit("    movq    %rax, %rdi");
            self.emit("    call    xly_truthy");
            self.emit("    testl   %eax, %eax");
            self.emitf(format_args!("    jz      {lbl_end}"));
            self.emit("    addq    $8, %rsp");
            self.emit_expr(right);
            self.emitf(format_args!("    jmp     {lbl_done}"));
            self.emitf(format_args!("{lbl_end}:"));
            self.emit("    popq    %rax");
            self.emitf(format_args!("{lbl_done}:"));
            return;
        }
        if op == "or" {
            let lbl_end = self.fresh_label("or_end");
            let lbl_done = self.fresh_label("or_done");
            self.emit_expr(left);
            self.emit("    pushq   %rax");
            self.emit("    movq    %rax, %rdi");
            self.emit("    call    xly_truthy");
            self.emit("    testl   %eax, %eax");
            self.emitf(format_args!("    jnz     {lbl_end}"));
            self.emit("    addq    $8, %rsp");
            self.emit_expr(right);
            self.emitf(format_args!("    jmp     {lbl_done}"));
            self.emitf(format_args!("{lbl_end}:"));
            self.emit("    popq    %rax");
            self.emitf(format_args!("{lbl_done}:"));
            return;
        }

        if matches!(op, "+" | "-" | "*" | "/") {
            self.emit_arith(op, left, right);
            return;
        }

        if matches!(op, "<" | ">" | "<=" | ">=" | "==" | "!=") {
            self.emit_compare(op, left, right);
            return;
        }

        // Remaining binary op: `%`.
        self.emit_expr(left);
        self.emit("    pushq   %rax");
        self.emit_expr(right);
        self.emit("    movq    %rax, %rsi");
        self.emit("    popq    %rdi");
        if op == "%" {
            self.emit("    call    xly_mod");
        }
    }

    fn const_numbers(left: &Expr, right: &Expr) -> Option<(f64, f64)> {
        match (left, right) {
            (Expr::Number(a), Expr::Number(b)) => Some((*a, *b)),
            _ => None,
        }
    }

    fn emit_arith(&mut self, op: &str, left: &Expr, right: &Expr) {
        if let Some((a, b)) = Self::const_numbers(left, right) {
            let result = match op {
                "+" => a + b,
                "-" => a - b,
                "*" => a * b,
                _ => a / b,
            };
            self.emit_load_double(result);
            self.emit("    call    xly_num");
            return;
        }

        if op == "+" {
            let lbl_slow = self.fresh_plain_label();
            let lbl_end = self.fresh_plain_label();
            self.emit_expr(left);
            self.emit("    pushq   %rax");
            self.emit_expr(right);
            self.emit("    movq    %rax, %rsi");
            self.emit("    popq    %rdi");
            self.emit("    cmpl    $1, (%rdi)");
            self.emitf(format_args!("    je      {lbl_slow}"));
            self.emit("    cmpl    $1, (%rsi)");
            self.emitf(format_args!("    je      {lbl_slow}"));
            self.emit("    movsd   8(%rdi), %xmm0");
            self.emit("    movsd   8(%rsi), %xmm1");
            self.emit("    addsd   %xmm1, %xmm0");
            self.emit("    call    xly_num");
            self.emitf(format_args!("    jmp     {lbl_end}"));
            self.emitf(format_args!("{lbl_slow}:"));
            self.emit("    call    xly_add");
            self.emitf(format_args!("{lbl_end}:"));
            return;
        }

        self.emit_expr(left);
        self.emit("    pushq   %rax");
        self.emit_expr(right);
        self.emit("    movq    %rax, %rsi");
        self.emit("    popq    %rdi");
        self.emit("    movsd   8(%rdi), %xmm0");
        self.emit("    movsd   8(%rsi), %xmm1");
        match op {
            "-" => self.emit("    subsd   %xmm1, %xmm0"),
            "*" => self.emit("    mulsd   %xmm1, %xmm0"),
            "/" => self.emit("    divsd   %xmm1, %xmm0"),
            _ => unreachable!(),
        }
        self.emit("    call    xly_num");
    }

    fn emit_compare(&mut self, op: &str, left: &Expr, right: &Expr) {
        if let Some((a, b)) = Self::const_numbers(left, right) {
            let result = match op {
                "<" => a < b,
                ">" => a > b,
                "<=" => a <= b,
                ">=" => a >= b,
                "==" => a == b,
                _ => a != b,
            };
            self.emitf(format_args!("    movl    ${}, %edi", result as i32));
            self.emit("    call    xly_bool");
            return;
        }

        let lbl_slow = self.fresh_plain_label();
        let lbl_end = self.fresh_plain_label();

        self.emit_expr(left);
        self.emit("    pushq   %rax");
        self.emit_expr(right);
        self.emit("    movq    %rax, %rsi");
        self.emit("    popq    %rdi");

        self.emit("    cmpl    $0, (%rdi)");
        self.emitf(format_args!("    jne     {lbl_slow}"));
        self.emit("    cmpl    $0, (%rsi)");
        self.emitf(format_args!("    jne     {lbl_slow}"));

        self.emit("    movsd   8(%rdi), %xmm0");
        self.emit("    movsd   8(%rsi), %xmm1");
        self.emit("    ucomisd %xmm1, %xmm0");
        let setcc = match op {
            "<" => "setb",
            ">" => "seta",
            "<=" => "setbe",
            ">=" => "setae",
            "==" => "sete",
            _ => "setne",
        };
        self.emitf(format_args!("    {setcc}    %al"));
        self.emit("    movzbl  %al, %edi");
        self.emit("    call    xly_bool");
        self.emitf(format_args!("    jmp     {lbl_end}"));
        self.emitf(format_args!("{lbl_slow}:"));
        let fn_name = match op {
            "==" => "xly_eq",
            "!=" => "xly_neq",
            "<" => "xly_lt",
            ">" => "xly_gt",
            "<=" => "xly_lte",
            _ => "xly_gte",
        };
        self.emitf(format_args!("    call    {fn_name}"));
        self.emitf(format_args!("{lbl_end}:"));
    }

    fn emit_inc_dec(&mut self, name: &str, is_inc: bool) {
        let off = self.var_offset(name);
        self.emitf(format_args!("    movq    {off}(%rbp), %rdi"));
        self.emit("    pushq   %rdi");
        self.emit_load_double(1.0);
        self.emit("    call    xly_num");
        self.emit("    movq    %rax, %rsi");
        self.emit("    popq    %rdi");
        self.emitf(format_args!(
            "    call    {}",
            if is_inc { "xly_add" } else { "xly_sub" }
        ));
        self.emitf(format_args!("    movq    %rax, {off}(%rbp)"));
    }

    /// Shared by array literals, `print`, and module calls: stack-allocate
    /// an array of `XlyVal*` slots via sub+store (not repeated pushes) so
    /// alignment is deterministic, then evaluate each element into its slot.
    fn stack_alloc_args(&mut self, exprs: &[Expr]) -> i32 {
        let n = exprs.len() as i32;
        let alloc_bytes = if n > 0 { ((n * 8) + 15) & !15 } else { 0 };
        if alloc_bytes > 0 {
            self.emitf(format_args!("    subq    ${alloc_bytes}, %rsp"));
        }
        for (i, e) in exprs.iter().enumerate() {
            self.emit_expr(e);
            self.emitf(format_args!("    movq    %rax, {}(%rsp)", i as i32 * 8));
        }
        alloc_bytes
    }

    fn emit_array_literal(&mut self, items: &[Expr]) {
        let alloc_bytes = self.stack_alloc_args(items);
        if !items.is_empty() {
            self.emit("    movq    %rsp, %rdi");
        } else {
            self.emit("    xorq    %rdi, %rdi");
        }
        self.emitf(format_args!("    movq    ${}, %rsi", items.len()));
        self.emit("    call    xly_array_create");
        if alloc_bytes > 0 {
            self.emitf(format_args!("    addq    ${alloc_bytes}, %rsp"));
        }
    }

    fn emit_call(&mut self, callee: &str, args: &[Expr], line: usize) {
        let mut nargs = args.len();
        if nargs > 6 {
            self.warnings.push(CodegenError::TooManyArguments {
                line,
                name: callee.to_string(),
                argc: nargs,
            });
            nargs = 6;
        }
        const REGS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];
        for a in &args[..nargs] {
            self.emit_expr(a);
            self.emit("    pushq   %rax");
        }
        for i in (0..nargs).rev() {
            self.emitf(format_args!("    popq    %{}", REGS[i]));
        }
        self.emitf(format_args!("    call    .Lxly_fn_{callee}"));
    }

    fn emit_module_call(&mut self, module: &str, func: &str, args: &[Expr]) {
        let alloc_bytes = self.stack_alloc_args(args);
        if !args.is_empty() {
            self.emit("    movq    %rsp, %rdx");
        } else {
            self.emit("    xorq    %rdx, %rdx");
        }
        let ml = self.intern_string(module);
        let fl = self.intern_string(func);
        self.emitf(format_args!("    leaq    {ml}(%rip), %rdi"));
        self.emitf(format_args!("    leaq    {fl}(%rip), %rsi"));
        self.emitf(format_args!("    movl    ${}, %ecx", args.len()));
        self.emit("    call    xly_call_module");
        if alloc_bytes > 0 {
            self.emitf(format_args!("    addq    ${alloc_bytes}, %rsp"));
        }
    }

    // ---------------------------------------------------------------- stmt

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl { name, value } => {
                let off = self.var_declare(name);
                match value {
                    Some(e) => self.emit_expr(e),
                    None => self.emit("    call    xly_null"),
                }
                self.emitf(format_args!("    movq    %rax, {off}(%rbp)"));
            }
            Stmt::Expr(e) => self.emit_expr(e),
            Stmt::Block(stmts) => self.emit_block(stmts),
            Stmt::FnDecl { name, params, body, .. } => {
                self.funcs.push(FnDeclRef {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                });
            }
            Stmt::Return { value, .. } => {
                match value {
                    Some(e) => self.emit_expr(e),
                    None => self.emit("    call    xly_null"),
                }
                self.emit("    movq    %rbp, %rsp");
                self.emit("    popq    %rbp");
                self.emit("    ret");
            }
            Stmt::If { cond, then_branch, else_branch } => self.emit_if(cond, then_branch, else_branch.as_deref()),
            Stmt::While { cond, body } => self.emit_while(cond, body),
            Stmt::DoWhile { cond, body } => self.emit_do_while(cond, body),
            Stmt::For { init, cond, update, body } => self.emit_for(init, cond, update, body),
            Stmt::ForIn { var_name, iterable, body } => self.emit_for_in(var_name, iterable, body),
            Stmt::Break => {
                if let Some(l) = self.brk_labels.last().cloned() {
                    self.emitf(format_args!("    jmp     {l}"));
                }
            }
            Stmt::Continue => {
                if let Some(l) = self.cnt_labels.last().cloned() {
                    self.emitf(format_args!("    jmp     {l}"));
                }
            }
            Stmt::Print(args) => self.emit_print(args),
            Stmt::Import { .. } => {
                // No-op: the runtime's native modules are linked statically.
            }
            // Export just wraps a declaration; codegen doesn't track visibility.
            Stmt::Export(inner) => self.emit_stmt(inner),
            // Classes have no native-codegen counterpart in this backend.
            Stmt::ClassDecl { .. } => {}
        }
    }

    fn emit_block(&mut self, stmts: &[Stmt]) {
        self.scope_enter();
        for s in stmts {
            self.emit_stmt(s);
        }
        self.scope_leave();
    }

    fn emit_print(&mut self, args: &[Expr]) {
        let alloc_bytes = self.stack_alloc_args(args);
        self.emit("    movq    %rsp, %rdi");
        self.emitf(format_args!("    movl    ${}, %esi", args.len()));
        self.emit("    call    xly_print");
        if alloc_bytes > 0 {
            self.emitf(format_args!("    addq    ${alloc_bytes}, %rsp"));
        }
    }

    fn emit_if(&mut self, cond: &Expr, then_branch: &[Stmt], else_branch: Option<&[Stmt]>) {
        let lbl_else = self.fresh_plain_label();
        let lbl_end = self.fresh_plain_label();

        self.emit_expr(cond);
        self.emit("    movq    %rax, %rdi");
        self.emit("    call    xly_truthy");
        self.emit("    testl   %eax, %eax");
        self.emitf(format_args!("    jz      {lbl_else}"));

        self.emit_block(then_branch);
        self.emitf(format_args!("    jmp     {lbl_end}"));

        self.emitf(format_args!("{lbl_else}:"));
        if let Some(else_stmts) = else_branch {
            self.emit_block(else_stmts);
        }

        self.emitf(format_args!("{lbl_end}:"));
    }

    fn emit_while(&mut self, cond: &Expr, body: &[Stmt]) {
        let lbl_cond = self.fresh_plain_label();
        let lbl_end = self.fresh_plain_label();

        self.push_brk(lbl_end.clone());
        self.push_cnt(lbl_cond.clone());

        self.emitf(format_args!("{lbl_cond}:"));
        self.emit_expr(cond);
        self.emit("    movq    %rax, %rdi");
        self.emit("    call    xly_truthy");
        self.emit("    testl   %eax, %eax");
        self.emitf(format_args!("    jz      {lbl_end}"));

        self.emit_block(body);
        self.emitf(format_args!("    jmp     {lbl_cond}"));

        self.emitf(format_args!("{lbl_end}:"));
        self.pop_cnt();
        self.pop_brk();
    }

    fn emit_do_while(&mut self, cond: &Expr, body: &[Stmt]) {
        let lbl_body = self.fresh_plain_label();
        let lbl_cond = self.fresh_plain_label();
        let lbl_end = self.fresh_plain_label();

        self.push_brk(lbl_end.clone());
        self.push_cnt(lbl_cond.clone());

        self.emitf(format_args!("{lbl_body}:"));
        self.emit_block(body);

        self.emitf(format_args!("{lbl_cond}:"));
        self.emit_expr(cond);
        self.emit("    movq    %rax, %rdi");
        self.emit("    call    xly_truthy");
        self.emit("    testl   %eax, %eax");
        self.emitf(format_args!("    jnz     {lbl_body}"));

        self.emitf(format_args!("{lbl_end}:"));
        self.pop_cnt();
        self.pop_brk();
    }

    fn emit_for(&mut self, init: &Stmt, cond: &Expr, update: &Stmt, body: &[Stmt]) {
        let lbl_cond = self.fresh_plain_label();
        let lbl_upd = self.fresh_plain_label();
        let lbl_end = self.fresh_plain_label();

        self.scope_enter();
        self.push_brk(lbl_end.clone());
        self.push_cnt(lbl_upd.clone());

        self.emit_stmt(init);

        self.emitf(format_args!("{lbl_cond}:"));
        // A literal-true condition (the parser's default for a missing
        // clause) needs no runtime check.
        let skip_check = matches!(cond, Expr::Bool(true));
        if !skip_check {
            self.emit_expr(cond);
            self.emit("    movq    %rax, %rdi");
            self.emit("    call    xly_truthy");
            self.emit("    testl   %eax, %eax");
            self.emitf(format_args!("    jz      {lbl_end}"));
        }

        self.emit_block(body);

        self.emitf(format_args!("{lbl_upd}:"));
        if !matches!(update, Stmt::Expr(Expr::Null)) {
            self.emit_stmt(update);
        }

        self.emitf(format_args!("    jmp     {lbl_cond}"));
        self.emitf(format_args!("{lbl_end}:"));

        self.pop_cnt();
        self.pop_brk();
        self.scope_leave();
    }

    fn emit_for_in(&mut self, var_name: &str, iterable: &Expr, body: &[Stmt]) {
        let lbl_cond = self.fresh_plain_label();
        let lbl_end = self.fresh_plain_label();

        self.scope_enter();

        let off_iter = self.var_declare(var_name);
        let seq = self.label_seq;
        self.label_seq += 1;
        let off_arr = self.var_declare(&format!("__fi_a_{seq}"));
        let off_idx = self.var_declare(&format!("__fi_i_{seq}"));
        let off_len = self.var_declare(&format!("__fi_l_{seq}"));

        self.emit_expr(iterable);
        self.emitf(format_args!("    movq    %rax, {off_arr}(%rbp)"));
        self.emit("    movq    %rax, %rdi");
        self.emit("    call    xly_array_len");
        self.emitf(format_args!("    movq    %rax, {off_len}(%rbp)"));
        self.emitf(format_args!("    movq    $0, {off_idx}(%rbp)"));

        self.push_brk(lbl_end.clone());
        self.push_cnt(lbl_cond.clone());

        self.emitf(format_args!("{lbl_cond}:"));
        self.emitf(format_args!("    movq    {off_idx}(%rbp), %rax"));
        self.emitf(format_args!("    cmpq    {off_len}(%rbp), %rax"));
        self.emitf(format_args!("    jae     {lbl_end}"));

        self.emitf(format_args!("    movq    {off_arr}(%rbp), %rdi"));
        self.emitf(format_args!("    movq    {off_idx}(%rbp), %rsi"));
        self.emit("    call    xly_array_get");
        self.emitf(format_args!("    movq    %rax, {off_iter}(%rbp)"));

        self.emit_block(body);

        self.emitf(format_args!("    movq    {off_idx}(%rbp), %rax"));
        self.emit("    addq    $1, %rax");
        self.emitf(format_args!("    movq    %rax, {off_idx}(%rbp)"));
        self.emitf(format_args!("    jmp     {lbl_cond}"));
        self.emitf(format_args!("{lbl_end}:"));

        self.pop_cnt();
        self.pop_brk();
        self.scope_leave();
    }

    // ---------------------------------------------------------------- fns

    /// Recursively count declaration sites that need a stack slot, so the
    /// frame is sized before any code for the function/program is emitted.
    fn count_locals_stmt(stmt: &Stmt) -> i32 {
        let direct = match stmt {
            Stmt::VarDecl { .. } => 1,
            Stmt::ForIn { .. } => 4,
            _ => 0,
        };
        let nested = match stmt {
            Stmt::Block(stmts) => stmts.iter().map(Codegen::count_locals_stmt).sum(),
            Stmt::If { then_branch, else_branch, .. } => {
                then_branch.iter().map(Codegen::count_locals_stmt).sum::<i32>()
                    + else_branch
                        .as_ref()
                        .map(|b| b.iter().map(Codegen::count_locals_stmt).sum())
                        .unwrap_or(0)
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => {
                body.iter().map(Codegen::count_locals_stmt).sum()
            }
            Stmt::For { init, update, body, .. } => {
                Codegen::count_locals_stmt(init)
                    + Codegen::count_locals_stmt(update)
                    + body.iter().map(Codegen::count_locals_stmt).sum::<i32>()
            }
            Stmt::ForIn { body, .. } => body.iter().map(Codegen::count_locals_stmt).sum(),
            Stmt::FnDecl { .. } => 0, // nested functions get their own frame
            Stmt::Export(inner) => Codegen::count_locals_stmt(inner),
            _ => 0,
        };
        direct + nested
    }

    fn count_locals_program(stmts: &[Stmt]) -> i32 {
        stmts.iter().map(Codegen::count_locals_stmt).sum()
    }

    fn emit_function(&mut self, f: &FnDeclRef) {
        let sv_vc = self.vars.len();
        let sv_fo = self.frame_offset;
        let sv_sd = self.scope_depth;
        self.scope_depth = 0;
        self.frame_offset = 0;

        let n = f.params.len() as i32 + Self::count_locals_program(&f.body) + 8;
        let frame = (n * 8 + 15) & !15;

        self.emit("");
        self.emitf(format_args!(".Lxly_fn_{}:", f.name));
        self.emit("    pushq   %rbp");
        self.emit("    movq    %rsp, %rbp");
        self.emitf(format_args!("    subq    ${frame}, %rsp"));

        const PREGS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];
        for (i, p) in f.params.iter().enumerate().take(6) {
            let off = self.var_declare(&p.name);
            self.emitf(format_args!("    movq    %{}, {off}(%rbp)", PREGS[i]));

            if let Some(default) = &p.default {
                let lbl_has_arg = self.fresh_plain_label();
                self.emitf(format_args!("    movq    {off}(%rbp), %rax"));
                self.emit("    testq   %rax, %rax");
                self.emitf(format_args!("    jnz     {lbl_has_arg}"));
                self.emit_expr(default);
                self.emitf(format_args!("    movq    %rax, {off}(%rbp)"));
                self.emitf(format_args!("{lbl_has_arg}:"));
            }
        }

        self.scope_enter();
        for s in &f.body {
            self.emit_stmt(s);
        }
        self.scope_leave();

        self.emit("    call    xly_null");
        self.emit("    movq    %rbp, %rsp");
        self.emit("    popq    %rbp");
        self.emit("    ret");

        self.vars.truncate(sv_vc);
        self.frame_offset = sv_fo;
        self.scope_depth = sv_sd;
    }

    /// Compiles a whole program to assembly text, returning the source and
    /// any non-fatal warnings (e.g. a call site truncated past 6 args).
    pub fn compile(program: &Program) -> (String, Vec<CodegenError>) {
        let mut cg = Codegen::new();

        let n_top = Self::count_locals_program(program) + 16;
        let mframe = (n_top * 8 + 15) & !15;

        cg.emit(".section .text");
        cg.emit(".globl  main");
        cg.emit("main:");
        cg.emit("    pushq   %rbp");
        cg.emit("    movq    %rsp, %rbp");
        cg.emitf(format_args!("    subq    ${mframe}, %rsp"));

        for stmt in program {
            cg.emit_stmt(stmt);
        }

        cg.emit("    movl    $0, %edi");
        cg.emit("    call    xly_exit");
        cg.emit("    movq    %rbp, %rsp");
        cg.emit("    popq    %rbp");
        cg.emit("    ret");

        let funcs = std::mem::take(&mut cg.funcs);
        for f in &funcs {
            cg.emit_function(f);
        }

        cg.emit("");
        cg.emit(".section .rodata");
        let strings = cg.strings.clone();
        for (text, label) in strings {
            cg.emitf(format_args!("{label}:"));
            cg.emitf(format_args!("    .asciz  \"{}\"", escape_asm_string(&text)));
        }

        cg.emit("");
        cg.emit(".section .note.GNU-stack,\"\",@progbits");

        (cg.out, cg.warnings)
    }
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

/// Escapes a string literal for a `.asciz` directive: named escapes for the
/// common control characters, octal escapes for everything else outside
/// printable ASCII (this keeps UTF-8 multibyte sequences byte-exact).
fn escape_asm_string(s: &str) -> String {
    let mut out = String::new();
    for &byte in s.as_bytes() {
        match byte {
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\{byte:03o}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn compile_ok(src: &str) -> (String, Vec<CodegenError>) {
        let (program, lex_errs, parse_errs) = parse_source(src);
        assert!(lex_errs.is_empty(), "{lex_errs:?}");
        assert!(parse_errs.is_empty(), "{parse_errs:?}");
        Codegen::compile(&program)
    }

    #[test]
    fn test_emits_main_label_and_exit() {
        let (asm, warnings) = compile_ok("print(1);");
        assert!(warnings.is_empty());
        assert!(asm.contains(".globl  main"));
        assert!(asm.contains("main:"));
        assert!(asm.contains("call    xly_exit"));
        assert!(asm.contains("call    xly_print"));
    }

    #[test]
    fn test_constant_arithmetic_is_folded() {
        let (asm, _) = compile_ok("print(2*9-6/3*5);");
        assert!(!asm.contains("xly_add"));
        assert!(!asm.contains("xly_mul"));
    }

    #[test]
    fn test_function_emits_label_and_call_site() {
        let (asm, _) = compile_ok("fn add(a, b) { return a + b; } print(add(1, 2));");
        assert!(asm.contains(".Lxly_fn_add:"));
        assert!(asm.contains("call    .Lxly_fn_add"));
    }

    #[test]
    fn test_too_many_arguments_warns_but_still_compiles() {
        let src = "fn f(a,b,c,d,e,g,h) { return a; } print(f(1,2,3,4,5,6,7));";
        let (asm, warnings) = compile_ok(src);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], CodegenError::TooManyArguments { argc: 7, .. }));
        assert!(asm.contains("call    .Lxly_fn_f"));
    }

    #[test]
    fn test_while_loop_emits_jumps_for_break_and_continue() {
        let src = "var i = 0; while (i < 3) { if (i == 1) { continue; } if (i == 2) { break; } i = i + 1; }";
        let (asm, _) = compile_ok(src);
        assert!(asm.contains("jmp"));
    }

    #[test]
    fn test_for_in_uses_array_runtime_helpers() {
        let (asm, _) = compile_ok("for x in [1, 2, 3] { print(x); }");
        assert!(asm.contains("xly_array_len"));
        assert!(asm.contains("xly_array_get"));
    }

    #[test]
    fn test_string_literal_is_interned_once() {
        let (asm, _) = compile_ok(r#"print("hi"); print("hi");"#);
        let occurrences = asm.matches(".Lxly_str_0").count();
        assert!(occurrences >= 2);
        assert!(!asm.contains(".Lxly_str_1"));
    }

    #[test]
    fn test_module_call_emits_xly_call_module() {
        let (asm, _) = compile_ok("import \"math\"; print(math.sqrt(16));");
        assert!(asm.contains("call    xly_call_module"));
    }

    #[test]
    fn test_escape_asm_string_uses_octal_for_high_bytes() {
        assert_eq!(escape_asm_string("a\nb"), "a\\nb");
        assert_eq!(escape_asm_string("\u{00e9}"), "\\303\\251");
    }
}
