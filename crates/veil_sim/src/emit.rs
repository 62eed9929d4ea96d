//! Text emission of the run program's epilogue.
//!
//! The per-cycle functions are written as the simulator steps; this
//! module appends everything that follows them: the cycle-chaining
//! `run_circuit`, the popcount helpers, the ledger-gated
//! randomize/fix/copy helpers, and the `RUN_LENGTH`/`DEBUG_INFO`
//! constants. Statement forms match the bit-sliced ALU contract of
//! the circuit utilities header (`wtype_t`, `rand_t`, `_xor`,
//! `popcnt`, `randbytes`, `ones`, `zeros`).

use crate::simulator::Simulator;

#[derive(Clone, Copy)]
enum Ledger {
    Secrets,
    Data,
    Masks,
}

impl Simulator<'_> {
    fn ledger(&self, which: Ledger) -> &[crate::program::GatedRange] {
        match which {
            Ledger::Secrets => &self.secret_ranges,
            Ledger::Data => &self.data_ranges,
            Ledger::Masks => &self.mask_ranges,
        }
    }

    pub(crate) fn emit_epilogue(&mut self) {
        self.emit_run_circuit();
        self.emit_count_run_range();
        self.emit_count_run();
        self.emit_run_and_count_circuit();

        self.emit_xor_runs();

        self.emit_ledger_randomize("randomize_secrets", Ledger::Secrets);
        self.emit_ledger_randomize("randomize_data", Ledger::Data);
        self.emit_ledger_randomize("randomize_masks", Ledger::Masks);

        self.emit_ledger_fix("fix_random_secrets", Ledger::Secrets);
        self.emit_ledger_fix("fix_random_data", Ledger::Data);

        self.emit_ledger_copy("copy_secrets", Ledger::Secrets);
        self.emit_ledger_copy("copy_data", Ledger::Data);

        self.emit_debug_info();
    }

    fn emit_run_circuit(&mut self) {
        let mut out = String::from("\nvoid run_circuit(wtype_t* s, uint32_t cycles)\n{\n");
        for k in 0..self.cycle_emits.len() {
            out.push_str(&format!("\tif (cycles == {k}) return;\n"));
            out.push_str(&format!("\trun_circuit_cycle_{k}(s);\n"));
        }
        out.push_str("}\n");
        self.mgr.push_text(&out);
    }

    fn emit_count_run_range(&mut self) {
        self.mgr.push_text(
            "\ninline __attribute__((always_inline)) void count_run_range(wtype_t* s, \
             uintmax_t* count, uint32_t from, uint32_t to)\n{\n\
             \tfor (uint32_t i = from; i < to; i++)\n\
             \t\tcount[i] += popcnt(s[i]);\n\
             }\n",
        );
    }

    fn emit_count_run(&mut self) {
        let mut out =
            String::from("\nvoid count_run(wtype_t* s, uintmax_t* count, uint32_t cycles)\n{\n");
        let mut start = 0;
        for ce in &self.cycle_emits {
            out.push_str(&format!("\tif (cycles == {}) return;\n", ce.cycle - 1));
            out.push_str(&format!("\tcount_run_range(s, count, {start}, {});\n", ce.end));
            start = ce.end;
        }
        out.push_str("}\n");
        self.mgr.push_text(&out);
    }

    fn emit_run_and_count_circuit(&mut self) {
        let mut out = String::from(
            "\nvoid run_and_count_circuit(wtype_t* s, uintmax_t* count, uint32_t cycles)\n{\n",
        );
        let mut start = 0;
        for ce in &self.cycle_emits {
            out.push_str(&format!("\tif (cycles == {}) return;\n", ce.cycle - 1));
            out.push_str(&format!("\trun_circuit_cycle_{}(s);\n", ce.cycle - 1));
            out.push_str(&format!("\tcount_run_range(s, count, {start}, {});\n", ce.end));
            start = ce.end;
        }
        out.push_str("}\n");
        self.mgr.push_text(&out);
    }

    fn emit_xor_runs(&mut self) {
        let mut out =
            String::from("\nvoid xor_runs(wtype_t* result, wtype_t* other, uint32_t cycles)\n{\n");
        let mut start = 0;
        for ce in &self.cycle_emits {
            out.push_str(&format!("\tif (cycles < {}) return;\n", ce.cycle));
            out.push_str(&format!("\tfor (uint32_t i = {start}; i < {}; i++)\n", ce.end));
            out.push_str("\t\tresult[i] = _xor(result[i], other[i]);\n");
            start = ce.end;
        }
        out.push_str("}\n");
        self.mgr.push_text(&out);
    }

    fn emit_ledger_randomize(&mut self, name: &str, which: Ledger) {
        let mut out = format!("\nvoid {name}(wtype_t* s, uint32_t cycles, rand_t& gen)\n{{\n");
        for g in self.ledger(which) {
            out.push_str(&format!("\tif (cycles < {}) return;\n", g.cycle));
            out.push_str(&format!(
                "\tfor (uint32_t i = {}; i <= {}; i++)\n",
                g.range.low(),
                g.range.high()
            ));
            out.push_str("\t\ts[i] = randbytes(gen);\n");
        }
        out.push_str("}\n");
        self.mgr.push_text(&out);
    }

    fn emit_ledger_fix(&mut self, name: &str, which: Ledger) {
        let mut out = format!("\nvoid {name}(wtype_t* s, uint32_t cycles, rand_t& gen)\n{{\n");
        out.push_str("\tuintmax_t rand_bits = gen();\n");
        out.push_str("\tuint32_t rand_pos = sizeof(uintmax_t) * 8 - 1;\n");
        for g in self.ledger(which) {
            out.push_str(&format!("\tif (cycles < {}) return;\n", g.cycle));
            out.push_str(&format!(
                "\tfor (uint32_t i = {}; i <= {}; i++)\n\t{{\n",
                g.range.low(),
                g.range.high()
            ));
            out.push_str("\t\ts[i] = (rand_bits >> rand_pos) & 1 ? ones : zeros;\n");
            out.push_str(
                "\t\tif (rand_pos == 0) { rand_bits = gen(); rand_pos = sizeof(uintmax_t) * 8 - 1; }\n",
            );
            out.push_str("\t\telse { rand_pos -= 1; }\n");
            out.push_str("\t}\n");
        }
        out.push_str("}\n");
        self.mgr.push_text(&out);
    }

    fn emit_ledger_copy(&mut self, name: &str, which: Ledger) {
        let mut out = format!("\nvoid {name}(wtype_t* dst, wtype_t* src, uint32_t cycles)\n{{\n");
        for g in self.ledger(which) {
            out.push_str(&format!("\tif (cycles < {}) return;\n", g.cycle));
            out.push_str(&format!(
                "\tfor (uint32_t i = {}; i <= {}; i++)\n",
                g.range.low(),
                g.range.high()
            ));
            out.push_str("\t\tdst[i] = src[i];\n");
        }
        out.push_str("}\n");
        self.mgr.push_text(&out);
    }

    fn emit_debug_info(&mut self) {
        let run_length = self.mgr.num_emitted();
        let mut out = format!("\nuint32_t RUN_LENGTH = {run_length};\n");
        out.push_str(&format!("const char* DEBUG_INFO[{}] = {{\n", self.debug_info.len()));
        if self.debug_info.is_empty() {
            out.push_str("\n};\n");
        } else {
            for info in &self.debug_info[..self.debug_info.len() - 1] {
                out.push_str(&format!("\t\"{info}\",\n"));
            }
            out.push_str(&format!(
                "\t\"{}\"\n}};\n",
                self.debug_info[self.debug_info.len() - 1]
            ));
        }
        self.mgr.push_text(&out);
    }
}
