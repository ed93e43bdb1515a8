// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Code generation: transforms the syntax tree into bytecode.

use std::sync::Arc;

use kiln_ast::{
    AssignOp, AssignTarget, Block, Case, Expr, For, Fragment, Func, InfixOp, Param, PostfixOp,
    PrefixOp, Program, Statement,
};
use tracing::{debug, trace};

use crate::code::Code;
use crate::object::{Function, Value};
use crate::opcode::{BinaryOpType, CompareOpType, Op, PLACEHOLDER, Word};

use super::emit::{BytecodeEmitter, control};
use super::symbols::{Resolution, Scope, SymbolTable};
use super::types::{CompileError, Loop, Result, Unit};

/// Maximum parameters per function and arguments per call.
pub const MAX_ARGS: usize = 255;

/// Compiles programs into bytecode.
///
/// One compiler holds the program code and the root symbol table for an
/// execution context. Each call to [`Compiler::compile`] appends to the same
/// program code, so later batches see globals declared by earlier ones and
/// the VM only has to run the new instructions.
///
/// # Example
///
/// ```rust
/// use kiln_ast::build::*;
/// use kiln_vm::Compiler;
///
/// let mut compiler = Compiler::new();
/// let code = compiler
///     .compile(&program(vec![var("x", int(1)), expr(add(ident("x"), int(2)))]))
///     .unwrap();
/// assert_eq!(code.global_count(), 1);
/// ```
#[derive(Debug)]
pub struct Compiler {
    symbols: SymbolTable,
    main: Unit,
    /// Function bodies being compiled, innermost last.
    functions: Vec<Unit>,
    source: Option<Arc<str>>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::from_symbols(SymbolTable::new())
    }

    /// A compiler that resolves the given names to `LoadBuiltin` indices,
    /// in order.
    pub fn with_builtins<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Result<Self> {
        Ok(Self::from_symbols(SymbolTable::with_builtins(names)?))
    }

    fn from_symbols(symbols: SymbolTable) -> Self {
        let root = symbols.root();
        Self {
            symbols,
            main: Unit::new(Code::new(None, None), root),
            functions: Vec::new(),
            source: None,
        }
    }

    /// Tag emitted code with a source identifier. Call before compiling.
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self.main.code = Code::new(None, self.source.clone());
        self
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Register a builtin name, returning its `LoadBuiltin` index.
    pub fn add_builtin(&mut self, name: &str) -> Result<u16> {
        self.symbols.insert_builtin(name)
    }

    /// Declare a global so hosts can set it before any script does.
    /// Declaring an existing global returns its slot.
    pub fn declare_global(&mut self, name: &str) -> Result<u16> {
        let root = self.symbols.root();
        if let Some(symbol) = self.symbols.get(root, name) {
            return Ok(symbol.index());
        }
        let symbol = self.symbols.insert_variable(root, name)?;
        self.main
            .code
            .set_global_count(self.symbols.slot_count(root) as usize);
        Ok(symbol.index())
    }

    /// Slot of a global declared at the top level.
    pub fn global_index(&self, name: &str) -> Option<u16> {
        self.symbols
            .get(self.symbols.root(), name)
            .map(|symbol| symbol.index())
    }

    /// The program code compiled so far.
    pub fn code(&self) -> Arc<Code> {
        Arc::new(self.main.code.clone())
    }

    /// Compile a batch of top-level statements onto the program code.
    ///
    /// On failure the program code is rolled back to where the batch began.
    /// Globals the batch declared stay declared and read as nil.
    #[tracing::instrument(level = "debug", skip_all, fields(statements = program.statements.len()))]
    pub fn compile(&mut self, program: &Program) -> Result<Arc<Code>> {
        let code = &self.main.code;
        let mark = (code.len(), code.constants().len(), code.names().len());
        let result = self.compile_statements(&program.statements);

        let root = self.symbols.root();
        self.main
            .code
            .set_global_count(self.symbols.slot_count(root) as usize);

        if let Err(err) = result {
            debug!(error = %err, "compile failed; rolling back batch");
            self.main.code.truncate(mark.0, mark.1, mark.2);
            self.main.scope = root;
            self.main.loops.clear();
            self.main.in_pipe = false;
            self.functions.clear();
            return Err(err);
        }

        trace!(
            words = self.main.code.len() - mark.0,
            constants = self.main.code.constants().len(),
            globals = self.main.code.global_count(),
            "compiled batch"
        );
        Ok(self.code())
    }

    // =========================================================================
    // Units & Scopes
    // =========================================================================

    fn unit(&self) -> &Unit {
        self.functions.last().unwrap_or(&self.main)
    }

    fn unit_mut(&mut self) -> &mut Unit {
        match self.functions.last_mut() {
            Some(unit) => unit,
            None => &mut self.main,
        }
    }

    fn position(&self) -> usize {
        self.unit().code.len()
    }

    /// Run `f` inside a fresh block scope.
    fn in_block_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let outer = self.unit().scope;
        let inner = self.symbols.new_block(outer);
        self.unit_mut().scope = inner;
        let result = f(self);
        self.unit_mut().scope = outer;
        result
    }

    /// Adjust the stack values a break or continue in the innermost loop
    /// has to discard.
    fn hold(&mut self, values: usize) {
        if let Some(lp) = self.unit_mut().loops.last_mut() {
            lp.held += values;
        }
    }

    fn release(&mut self, values: usize) {
        if let Some(lp) = self.unit_mut().loops.last_mut() {
            lp.held -= values;
        }
    }

    // =========================================================================
    // Names
    // =========================================================================

    fn resolve(&mut self, name: &str) -> Result<Resolution> {
        let scope = self.unit().scope;
        self.symbols
            .resolve(scope, name)?
            .ok_or_else(|| CompileError::Undefined(name.to_string()))
    }

    /// Resolve a name that is about to be written.
    fn resolve_assignable(&mut self, name: &str) -> Result<Resolution> {
        let resolution = self.resolve(name)?;
        if resolution.symbol.is_constant() || resolution.scope == Scope::Builtin {
            return Err(CompileError::AssignToConstant(name.to_string()));
        }
        Ok(resolution)
    }

    fn emit_load(&mut self, resolution: &Resolution) {
        let (op, index) = match resolution.scope {
            Scope::Global => (Op::LoadGlobal, resolution.symbol.index()),
            Scope::Local => (Op::LoadFast, resolution.symbol.index()),
            Scope::Free => (Op::LoadFree, resolution.free_index),
            Scope::Builtin => (Op::LoadBuiltin, resolution.symbol.index()),
        };
        self.emit(op, &[index]);
    }

    fn emit_store(&mut self, resolution: &Resolution) -> Result<()> {
        let (op, index) = match resolution.scope {
            Scope::Global => (Op::StoreGlobal, resolution.symbol.index()),
            Scope::Local => (Op::StoreFast, resolution.symbol.index()),
            Scope::Free => (Op::StoreFree, resolution.free_index),
            Scope::Builtin => {
                return Err(CompileError::AssignToConstant(
                    resolution.symbol.name().to_string(),
                ));
            }
        };
        self.emit(op, &[index]);
        Ok(())
    }

    /// Declare `name` in the current scope and store TOS into it.
    fn declare(&mut self, name: &str, constant: bool) -> Result<()> {
        let scope = self.unit().scope;
        let symbol = if constant {
            self.symbols.insert_constant(scope, name)?
        } else {
            self.symbols.insert_variable(scope, name)?
        };
        let op = if self.symbols.is_global(scope) {
            Op::StoreGlobal
        } else {
            Op::StoreFast
        };
        self.emit(op, &[symbol.index()]);
        Ok(())
    }

    // =========================================================================
    // Jumps
    // =========================================================================

    fn patch_jump_to(&mut self, pos: usize, target: usize) -> Result<()> {
        let delta = target
            .checked_sub(pos)
            .and_then(|d| Word::try_from(d).ok())
            .filter(|&d| d != PLACEHOLDER)
            .ok_or(CompileError::JumpTooFar)?;
        self.unit_mut().code.set_word(pos + 1, delta);
        Ok(())
    }

    fn emit_jump_back(&mut self, target: usize) -> Result<()> {
        let delta = Word::try_from(self.position() - target).map_err(|_| CompileError::JumpTooFar)?;
        self.emit(Op::JumpBackward, &[delta]);
        Ok(())
    }

    fn pop_loop(&mut self) -> Result<Loop> {
        self.unit_mut()
            .loops
            .pop()
            .ok_or_else(|| CompileError::Internal("loop stack underflow".into()))
    }

    fn patch_loop(&mut self, lp: Loop, break_target: usize, continue_target: usize) -> Result<()> {
        for pos in lp.breaks {
            self.patch_jump_to(pos, break_target)?;
        }
        for pos in lp.continues {
            self.patch_jump_to(pos, continue_target)?;
        }
        Ok(())
    }

    /// Compile a loop body with a fresh loop record open.
    fn compile_loop_body(&mut self, body: &Block) -> Result<Loop> {
        self.unit_mut().loops.push(Loop::default());
        let compiled = self.compile_block(body);
        let lp = self.pop_loop()?;
        compiled?;
        self.emit(Op::PopTop, &[]);
        Ok(lp)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Statement list semantics shared by programs and blocks: every
    /// expression value except the last is popped, and a list that does not
    /// end in an expression yields nil. Nothing follows a trailing return.
    fn compile_statements(&mut self, statements: &[Statement]) -> Result<()> {
        for (i, statement) in statements.iter().enumerate() {
            self.compile_statement(statement)?;
            if statement.is_expression() && i + 1 < statements.len() {
                self.emit(Op::PopTop, &[]);
            }
        }
        match statements.last() {
            Some(last) if last.is_expression() => {}
            Some(Statement::Return(_)) => {}
            _ => {
                self.emit(Op::Nil, &[]);
            }
        }
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Var { name, value } => {
                self.compile_expr(value)?;
                self.declare(name, false)
            }
            Statement::Const { name, value } => {
                self.compile_expr(value)?;
                self.declare(name, true)
            }
            Statement::MultiVar { names, value } => self.compile_multi_var(names, value),
            Statement::Assign { target, op, value } => self.compile_assign(target, *op, value),
            Statement::SetAttr {
                object,
                name,
                value,
            } => {
                self.compile_expr(value)?;
                self.compile_expr(object)?;
                let index = self.unit_mut().code.add_name(name)?;
                self.emit(Op::StoreAttr, &[index]);
                Ok(())
            }
            Statement::Postfix { name, op } => {
                let resolution = self.resolve_assignable(name)?;
                self.emit_load(&resolution);
                let step = match op {
                    PostfixOp::Inc => 1,
                    PostfixOp::Dec => -1,
                };
                self.emit_constant(Value::Int(step))?;
                self.emit(Op::BinaryOp, &[BinaryOpType::Add as Word]);
                self.emit_store(&resolution)
            }
            Statement::Return(value) => {
                if self.functions.is_empty() {
                    return Err(CompileError::ReturnOutsideFunction);
                }
                match value {
                    Some(value) => {
                        self.compile_expr(value)?;
                        self.emit(Op::ReturnValue, &[1]);
                    }
                    None => {
                        self.emit(Op::ReturnValue, &[0]);
                    }
                }
                Ok(())
            }
            Statement::Break => self.compile_loop_exit(true),
            Statement::Continue => self.compile_loop_exit(false),
            Statement::For(node) => self.compile_for(node),
            Statement::Func(func) => {
                let name = func
                    .name
                    .as_deref()
                    .ok_or_else(|| CompileError::Internal("function declaration without a name".into()))?;
                self.compile_function(func)?;
                self.declare(name, true)
            }
            Statement::Expr(expr) => self.compile_expr(expr),
        }
    }

    fn compile_multi_var(&mut self, names: &[String], value: &Expr) -> Result<()> {
        let count = Word::try_from(names.len()).map_err(|_| CompileError::TooManySymbols)?;
        self.compile_expr(value)?;
        self.emit(Op::Unpack, &[count]);
        let scope = self.unit().scope;
        let symbols = names
            .iter()
            .map(|name| self.symbols.insert_variable(scope, name))
            .collect::<Result<Vec<_>>>()?;
        let op = if self.symbols.is_global(scope) {
            Op::StoreGlobal
        } else {
            Op::StoreFast
        };
        // Unpack leaves the first item deepest.
        for symbol in symbols.iter().rev() {
            self.emit(op, &[symbol.index()]);
        }
        Ok(())
    }

    fn compile_assign(&mut self, target: &AssignTarget, op: AssignOp, value: &Expr) -> Result<()> {
        match target {
            AssignTarget::Name(name) => {
                let resolution = self.resolve_assignable(name)?;
                match op.infix() {
                    None => self.compile_expr(value)?,
                    Some(infix) => {
                        self.emit_load(&resolution);
                        self.compile_expr(value)?;
                        let (op, operand) = operator(infix);
                        self.emit(op, &[operand]);
                    }
                }
                self.emit_store(&resolution)
            }
            AssignTarget::Index { object, index } => {
                if op != AssignOp::Assign {
                    return Err(CompileError::Unsupported(format!(
                        "operator {op:?} on an index expression"
                    )));
                }
                self.compile_expr(value)?;
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit(Op::StoreSubscr, &[]);
                Ok(())
            }
        }
    }

    fn compile_loop_exit(&mut self, is_break: bool) -> Result<()> {
        let Some(held) = self.unit().loops.last().map(|lp| lp.held) else {
            return Err(if is_break {
                CompileError::BreakOutsideLoop
            } else {
                CompileError::ContinueOutsideLoop
            });
        };
        for _ in 0..held {
            self.emit(Op::PopTop, &[]);
        }
        let jump = self.emit_jump(Op::JumpForward);
        if let Some(lp) = self.unit_mut().loops.last_mut() {
            if is_break {
                lp.breaks.push(jump);
            } else {
                lp.continues.push(jump);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Loops
    // =========================================================================

    fn compile_for(&mut self, node: &For) -> Result<()> {
        match node {
            For::Loop { body } => self.compile_simple_loop(None, body),
            For::Condition { cond, body } => self.compile_simple_loop(Some(cond), body),
            For::Classic {
                init,
                cond,
                post,
                body,
            } => self.in_block_scope(|c| {
                c.compile_classic_loop(init.as_deref(), cond.as_ref(), post.as_deref(), body)
            }),
            For::Range {
                names,
                iterable,
                body,
            } => self.in_block_scope(|c| c.compile_range_loop(names, iterable, body)),
        }
    }

    /// `for { }` and `for cond { }`.
    fn compile_simple_loop(&mut self, cond: Option<&Expr>, body: &Block) -> Result<()> {
        let start = self.position();
        let exit_jump = match cond {
            Some(cond) => {
                self.compile_expr(cond)?;
                Some(self.emit_jump(Op::PopJumpForwardIfFalse))
            }
            None => None,
        };
        let lp = self.compile_loop_body(body)?;
        let continue_target = self.position();
        self.emit_jump_back(start)?;

        let exit = self.position();
        if let Some(jump) = exit_jump {
            self.patch_jump(jump)?;
        }
        self.emit(Op::Nop, &[]);
        self.patch_loop(lp, exit, continue_target)
    }

    /// `for init; cond; post { }`. Runs inside its own block scope so `init`
    /// declarations stay local to the loop.
    fn compile_classic_loop(
        &mut self,
        init: Option<&Statement>,
        cond: Option<&Expr>,
        post: Option<&Statement>,
        body: &Block,
    ) -> Result<()> {
        if let Some(init) = init {
            self.compile_statement(init)?;
            if init.is_expression() {
                self.emit(Op::PopTop, &[]);
            }
        }
        let start = self.position();
        let exit_jump = match cond {
            Some(cond) => {
                self.compile_expr(cond)?;
                Some(self.emit_jump(Op::PopJumpForwardIfFalse))
            }
            None => None,
        };
        let lp = self.compile_loop_body(body)?;

        let continue_target = self.position();
        if let Some(post) = post {
            self.compile_statement(post)?;
            if post.is_expression() {
                self.emit(Op::PopTop, &[]);
            }
        }
        self.emit_jump_back(start)?;

        let exit = self.position();
        if let Some(jump) = exit_jump {
            self.patch_jump(jump)?;
        }
        self.emit(Op::Nop, &[]);
        self.patch_loop(lp, exit, continue_target)
    }

    /// `for k, v := range iterable { }`. The iterator stays on the stack for
    /// the life of the loop; `ForIter` drops it when exhausted and breaks
    /// land on a `PopTop` that drops it.
    fn compile_range_loop(&mut self, names: &[String], iterable: &Expr, body: &Block) -> Result<()> {
        if names.len() > 2 {
            return Err(CompileError::Unsupported(format!(
                "range loop with {} names",
                names.len()
            )));
        }
        self.compile_expr(iterable)?;
        self.emit(Op::GetIter, &[]);

        let start = self.position();
        let for_iter = self.emit(Op::ForIter, &[PLACEHOLDER, names.len() as Word]);
        // The key is on top, then the value.
        for name in names {
            if name == "_" {
                self.emit(Op::PopTop, &[]);
            } else {
                self.declare(name, false)?;
            }
        }
        let lp = self.compile_loop_body(body)?;
        let continue_target = self.position();
        self.emit_jump_back(start)?;

        let break_target = self.position();
        self.emit(Op::PopTop, &[]);
        self.patch_jump(for_iter)?;
        self.emit(Op::Nop, &[]);
        self.patch_loop(lp, break_target, continue_target)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn compile_function(&mut self, func: &Func) -> Result<()> {
        if func.params.len() > MAX_ARGS {
            return Err(CompileError::TooManyArguments {
                what: "parameter",
                limit: MAX_ARGS,
                got: func.params.len(),
            });
        }
        let defaults = func
            .params
            .iter()
            .map(default_value)
            .collect::<Result<Vec<_>>>()?;

        let outer = self.unit().scope;
        let scope = self.symbols.new_child(outer);
        for param in &func.params {
            self.symbols.insert_variable(scope, &param.name)?;
        }
        if let Some(name) = &func.name {
            if self.symbols.get(scope, name).is_none() {
                self.symbols.insert_constant(scope, name)?;
            }
        }

        self.functions
            .push(Unit::new(Code::new(func.name.clone(), self.source.clone()), scope));
        let compiled = self.compile_function_body(&func.body);
        let unit = self
            .functions
            .pop()
            .ok_or_else(|| CompileError::Internal("function unit stack underflow".into()))?;
        compiled?;

        let mut code = unit.code;
        code.set_local_count(self.symbols.slot_count(scope) as usize);
        let free = self.symbols.free_vars(scope).to_vec();
        debug!(
            name = func.name.as_deref().unwrap_or("<anonymous>"),
            params = func.params.len(),
            locals = code.local_count(),
            free = free.len(),
            words = code.len(),
            "compiled function"
        );

        let function = Function::new(
            func.name.clone(),
            func.param_names(),
            defaults,
            Arc::new(code),
        );
        let index = self.unit_mut().code.add_constant(Value::function(function))?;
        if free.is_empty() {
            self.emit(Op::LoadConst, &[index]);
            return Ok(());
        }

        // Each captured variable is either a slot of the enclosing frame or
        // a cell the enclosing function captured itself.
        for var in &free {
            let name = var.symbol.name();
            let source = self
                .symbols
                .resolve(outer, name)?
                .ok_or_else(|| CompileError::Internal(format!("captured {name:?} is unresolvable")))?;
            match source.scope {
                Scope::Local => self.emit(Op::MakeCell, &[source.symbol.index(), 0]),
                Scope::Free => self.emit(Op::MakeCell, &[source.free_index, 1]),
                Scope::Global | Scope::Builtin => {
                    return Err(CompileError::Internal(format!(
                        "captured {name:?} resolved to a {:?} symbol",
                        source.scope
                    )));
                }
            };
        }
        let count = Word::try_from(free.len()).map_err(|_| CompileError::TooManySymbols)?;
        self.emit(Op::LoadClosure, &[index, count]);
        Ok(())
    }

    fn compile_function_body(&mut self, body: &Block) -> Result<()> {
        self.compile_block(body)?;
        if !body.ends_with_return() {
            self.emit(Op::ReturnValue, &[1]);
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn compile_args(&mut self, args: &[Expr]) -> Result<Word> {
        if args.len() > MAX_ARGS {
            return Err(CompileError::TooManyArguments {
                what: "args",
                limit: MAX_ARGS,
                got: args.len(),
            });
        }
        for arg in args {
            self.compile_expr(arg)?;
        }
        Ok(args.len() as Word)
    }

    fn compile_call(&mut self, func: &Expr, args: &[Expr], op: Op) -> Result<()> {
        self.compile_expr(func)?;
        let argc = self.compile_args(args)?;
        self.emit(op, &[argc]);
        Ok(())
    }

    fn compile_method_call(&mut self, object: &Expr, method: &str, args: &[Expr], op: Op) -> Result<()> {
        self.compile_expr(object)?;
        let name = self.unit_mut().code.add_name(method)?;
        self.emit(Op::LoadAttr, &[name]);
        let argc = self.compile_args(args)?;
        self.emit(op, &[argc]);
        Ok(())
    }

    fn compile_pipe(&mut self, stages: &[Expr]) -> Result<()> {
        if self.unit().in_pipe {
            return Err(CompileError::NestedPipe);
        }
        let [first, rest @ ..] = stages else {
            return Err(CompileError::PipeTooShort);
        };
        if rest.is_empty() {
            return Err(CompileError::PipeTooShort);
        }
        self.compile_expr(first)?;
        self.unit_mut().in_pipe = true;
        let result = rest
            .iter()
            .try_for_each(|stage| self.compile_pipe_stage(stage));
        self.unit_mut().in_pipe = false;
        result
    }

    /// A stage written as a call binds its arguments into a partial so the
    /// piped value arrives first.
    fn compile_pipe_stage(&mut self, stage: &Expr) -> Result<()> {
        match stage {
            Expr::Call { func, args } => self.compile_call(func, args, Op::Partial)?,
            Expr::MethodCall {
                object,
                method,
                args,
            } => self.compile_method_call(object, method, args, Op::Partial)?,
            other => self.compile_expr(other)?,
        }
        self.emit(Op::Swap, &[1]);
        self.emit(Op::Call, &[1]);
        Ok(())
    }

    fn compile_switch(&mut self, value: &Expr, cases: &[Case], default: Option<&Block>) -> Result<()> {
        self.compile_expr(value)?;
        let mut case_jumps = Vec::with_capacity(cases.len());
        for case in cases {
            let mut jumps = Vec::with_capacity(case.exprs.len());
            for expr in &case.exprs {
                self.emit(Op::Copy, &[0]);
                self.compile_expr(expr)?;
                self.emit(Op::CompareOp, &[CompareOpType::Equal as Word]);
                jumps.push(self.emit_jump(Op::PopJumpForwardIfTrue));
            }
            case_jumps.push(jumps);
        }
        let default_jump = self.emit_jump(Op::JumpForward);

        // The subject stays on the stack until the end of the switch.
        self.hold(1);
        let bodies = self.compile_switch_bodies(cases, case_jumps, default_jump, default);
        self.release(1);
        bodies?;

        self.emit(Op::Swap, &[1]);
        self.emit(Op::PopTop, &[]);
        Ok(())
    }

    fn compile_switch_bodies(
        &mut self,
        cases: &[Case],
        case_jumps: Vec<Vec<usize>>,
        default_jump: usize,
        default: Option<&Block>,
    ) -> Result<()> {
        let mut end_jumps = Vec::with_capacity(cases.len());
        for (case, jumps) in cases.iter().zip(case_jumps) {
            for jump in jumps {
                self.patch_jump(jump)?;
            }
            match &case.body {
                Some(body) => self.compile_block(body)?,
                None => {
                    self.emit(Op::Nil, &[]);
                }
            }
            end_jumps.push(self.emit_jump(Op::JumpForward));
        }
        self.patch_jump(default_jump)?;
        match default {
            Some(body) => self.compile_block(body)?,
            None => {
                self.emit(Op::Nil, &[]);
            }
        }
        for jump in end_jumps {
            self.patch_jump(jump)?;
        }
        Ok(())
    }

    fn compile_template(&mut self, fragments: &[Fragment]) -> Result<()> {
        let count = collection_size(fragments.len())?;
        for fragment in fragments {
            match fragment {
                Fragment::Text(text) => self.emit_constant(Value::string(text.as_str()))?,
                Fragment::Expr(Some(expr)) => self.compile_expr(expr)?,
                Fragment::Expr(None) => self.emit_constant(Value::string(""))?,
            }
        }
        self.emit(Op::BuildString, &[count]);
        Ok(())
    }

    fn compile_items(&mut self, items: &[Expr], op: Op) -> Result<()> {
        let count = collection_size(items.len())?;
        for item in items {
            self.compile_expr(item)?;
        }
        self.emit(op, &[count]);
        Ok(())
    }
}

impl BytecodeEmitter for Compiler {
    fn emit(&mut self, op: Op, operands: &[Word]) -> usize {
        self.unit_mut().code.emit(op, operands)
    }

    fn emit_constant(&mut self, value: Value) -> Result<()> {
        let index = self.unit_mut().code.add_constant(value)?;
        self.emit(Op::LoadConst, &[index]);
        Ok(())
    }

    fn emit_jump(&mut self, op: Op) -> usize {
        self.emit(op, &[PLACEHOLDER])
    }

    fn patch_jump(&mut self, pos: usize) -> Result<()> {
        let target = self.position();
        self.patch_jump_to(pos, target)
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Nil => {
                self.emit(Op::Nil, &[]);
            }
            Expr::Bool(true) => {
                self.emit(Op::True, &[]);
            }
            Expr::Bool(false) => {
                self.emit(Op::False, &[]);
            }
            Expr::Int(n) => self.emit_constant(Value::Int(*n))?,
            Expr::Float(f) => self.emit_constant(Value::Float(*f))?,
            Expr::Str(s) => self.emit_constant(Value::string(s.as_str()))?,
            Expr::Template(fragments) => self.compile_template(fragments)?,
            Expr::Ident(name) => {
                let resolution = self.resolve(name)?;
                self.emit_load(&resolution);
            }
            Expr::Prefix { op, right } => {
                self.compile_expr(right)?;
                let op = match op {
                    PrefixOp::Neg => Op::UnaryNegative,
                    PrefixOp::Not => Op::UnaryNot,
                };
                self.emit(op, &[]);
            }
            Expr::Infix { left, op, right } => match op {
                InfixOp::And => control::compile_and(self, left, right)?,
                InfixOp::Or => control::compile_or(self, left, right)?,
                op => {
                    self.compile_expr(left)?;
                    self.compile_expr(right)?;
                    let (op, operand) = operator(*op);
                    self.emit(op, &[operand]);
                }
            },
            Expr::Ternary {
                cond,
                if_true,
                if_false,
            } => control::compile_ternary(self, cond, if_true, if_false)?,
            Expr::If {
                cond,
                consequence,
                alternative,
            } => control::compile_if(self, cond, consequence, alternative.as_ref())?,
            Expr::Switch {
                value,
                cases,
                default,
            } => self.compile_switch(value, cases, default.as_ref())?,
            Expr::Call { func, args } => self.compile_call(func, args, Op::Call)?,
            Expr::MethodCall {
                object,
                method,
                args,
            } => self.compile_method_call(object, method, args, Op::Call)?,
            Expr::GetAttr { object, name } => {
                self.compile_expr(object)?;
                let index = self.unit_mut().code.add_name(name)?;
                self.emit(Op::LoadAttr, &[index]);
            }
            Expr::Index { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit(Op::BinarySubscr, &[]);
            }
            Expr::Slice { object, from, to } => {
                self.compile_expr(object)?;
                match to {
                    Some(to) => self.compile_expr(to)?,
                    None => {
                        self.emit(Op::Copy, &[0]);
                        self.emit(Op::Length, &[]);
                    }
                }
                match from {
                    Some(from) => self.compile_expr(from)?,
                    None => self.emit_constant(Value::Int(0))?,
                }
                self.emit(Op::Slice, &[]);
            }
            Expr::List(items) => self.compile_items(items, Op::BuildList)?,
            Expr::Set(items) => self.compile_items(items, Op::BuildSet)?,
            Expr::Map(entries) => {
                let count = collection_size(entries.len())?;
                for (key, value) in entries {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.emit(Op::BuildMap, &[count]);
            }
            Expr::In {
                item,
                container,
                negated,
            } => {
                self.compile_expr(container)?;
                self.compile_expr(item)?;
                self.emit(Op::ContainsOp, &[Word::from(*negated)]);
            }
            Expr::Pipe(stages) => self.compile_pipe(stages)?,
            Expr::Func(func) => self.compile_function(func)?,
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<()> {
        self.in_block_scope(|c| c.compile_statements(&block.statements))
    }
}

/// Opcode and operand for a non-short-circuit infix operator.
fn operator(op: InfixOp) -> (Op, Word) {
    let binary = |op: BinaryOpType| (Op::BinaryOp, op as Word);
    let compare = |op: CompareOpType| (Op::CompareOp, op as Word);
    match op {
        InfixOp::Add => binary(BinaryOpType::Add),
        InfixOp::Sub => binary(BinaryOpType::Subtract),
        InfixOp::Mul => binary(BinaryOpType::Multiply),
        InfixOp::Div => binary(BinaryOpType::Divide),
        InfixOp::Mod => binary(BinaryOpType::Modulo),
        InfixOp::Pow => binary(BinaryOpType::Power),
        InfixOp::Xor => binary(BinaryOpType::Xor),
        InfixOp::Shl => binary(BinaryOpType::LShift),
        InfixOp::Shr => binary(BinaryOpType::RShift),
        InfixOp::BitAnd => binary(BinaryOpType::BitwiseAnd),
        InfixOp::BitOr => binary(BinaryOpType::BitwiseOr),
        InfixOp::And => binary(BinaryOpType::And),
        InfixOp::Or => binary(BinaryOpType::Or),
        InfixOp::Eq => compare(CompareOpType::Equal),
        InfixOp::Ne => compare(CompareOpType::NotEqual),
        InfixOp::Lt => compare(CompareOpType::LessThan),
        InfixOp::Le => compare(CompareOpType::LessThanOrEqual),
        InfixOp::Gt => compare(CompareOpType::GreaterThan),
        InfixOp::Ge => compare(CompareOpType::GreaterThanOrEqual),
    }
}

fn collection_size(len: usize) -> Result<Word> {
    Word::try_from(len).map_err(|_| CompileError::TooManyArguments {
        what: "items",
        limit: Word::MAX as usize,
        got: len,
    })
}

/// Parameter defaults are limited to literals.
fn default_value(param: &Param) -> Result<Option<Value>> {
    let Some(default) = &param.default else {
        return Ok(None);
    };
    let value = match default {
        Expr::Nil => Value::Nil,
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Int(n) => Value::Int(*n),
        Expr::Float(f) => Value::Float(*f),
        Expr::Str(s) => Value::string(s.as_str()),
        Expr::Prefix {
            op: PrefixOp::Neg,
            right,
        } => match right.as_ref() {
            Expr::Int(n) => Value::Int(n.wrapping_neg()),
            Expr::Float(f) => Value::Float(-f),
            _ => return Err(CompileError::UnsupportedDefault(param.name.clone())),
        },
        _ => return Err(CompileError::UnsupportedDefault(param.name.clone())),
    };
    Ok(Some(value))
}
