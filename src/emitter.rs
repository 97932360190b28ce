use crate::listing::DataEntry;
use crate::translator::Translation;

pub const PRINT_INT: &str = "_print_int";
pub const PRINT_STRING: &str = "_print_string";

/*
Both helpers take one pushed argument and no receiver, return with a plain RET
and leave the argument for the caller to pop. They clobber EAX EBX ECX EDX and
ESI, none of which the generated code keeps alive across a call.
*/
const PRINT_INT_HELPER: &str = "\
_print_int:
    PUSH EBP
    MOV EBP, ESP
    SUB ESP, 16
    MOV EAX, [EBP + 8]
    LEA ECX, [EBP - 1]
    MOV BYTE [ECX], 10
    XOR ESI, ESI
    CMP EAX, 0
    JGE _print_int_digits
    MOV ESI, 1
    NEG EAX
_print_int_digits:
    MOV EBX, 10
_print_int_loop:
    XOR EDX, EDX
    DIV EBX
    ADD EDX, 48
    DEC ECX
    MOV [ECX], DL
    CMP EAX, 0
    JNE _print_int_loop
    CMP ESI, 0
    JE _print_int_write
    DEC ECX
    MOV BYTE [ECX], 45
_print_int_write:
    MOV EDX, EBP
    SUB EDX, ECX
    MOV EAX, 4
    MOV EBX, 1
    INT 0x80
    MOV ESP, EBP
    POP EBP
    RET
";

// strings are stored newline- and NUL-terminated, the newline is written too
const PRINT_STRING_HELPER: &str = "\
_print_string:
    PUSH EBP
    MOV EBP, ESP
    MOV ECX, [EBP + 8]
    XOR EDX, EDX
_print_string_length:
    CMP BYTE [ECX + EDX], 0
    JE _print_string_write
    INC EDX
    JMP _print_string_length
_print_string_write:
    MOV EAX, 4
    MOV EBX, 1
    INT 0x80
    POP EBP
    RET
";

pub const LINK_NOTE: &str = "; no _start symbol, link with ld -m elf_i386 -e _main\n";

const EXIT: [&str; 3] = ["MOV EAX, 1", "XOR EBX, EBX", "INT 0x80"];

/// Lay out the whole program. The translation is trusted as is.
pub fn emit(translation: &Translation) -> String {
    let mut out = String::new();

    out.push_str("segment .data\n");
    for entry in translation.data().entries() {
        out.push_str(&data_line(entry));
        out.push('\n');
    }

    out.push_str("\nsegment .text\n");
    out.push_str("global _main\n");
    out.push_str(LINK_NOTE);
    out.push('\n');
    out.push_str(PRINT_INT_HELPER);
    out.push('\n');
    out.push_str(PRINT_STRING_HELPER);
    out.push('\n');

    if let Some(main) = translation.entry_point() {
        out.push_str(&main.text());
    }
    for line in EXIT {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }

    for method in translation.methods() {
        out.push('\n');
        out.push_str(&method.text());
    }

    log::debug!(
        "emitted {} methods and {} data entries",
        translation.methods().count(),
        translation.data().len()
    );
    out
}

/// `label db "text", 34, "more", 10, 0`
fn data_line(entry: &DataEntry) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run = String::new();

    for &byte in &entry.bytes {
        if (0x20..0x7f).contains(&byte) && byte != b'"' {
            run.push(byte as char);
        } else {
            if !run.is_empty() {
                parts.push(format!("\"{}\"", run));
                run.clear();
            }
            parts.push(byte.to_string());
        }
    }
    if !run.is_empty() {
        parts.push(format!("\"{}\"", run));
    }
    parts.push("10".to_string());
    parts.push("0".to_string());

    format!("{} db {}", entry.label, parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;
    use crate::translator::Translator;

    fn compile(source: &str) -> String {
        let tokens = Tokenizer::new(source).tokenize().unwrap();
        emit(&Translator::new(tokens).analyze().unwrap())
    }

    fn entry(label: &str, bytes: &[u8]) -> DataEntry {
        DataEntry {
            label: label.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn data_lines() {
        assert_eq!(data_line(&entry("main_s", b"hello")), "main_s db \"hello\", 10, 0");
        assert_eq!(data_line(&entry("main_e", b"")), "main_e db 10, 0");
        assert_eq!(
            data_line(&entry("main_q", b"say \"hi\"\n")),
            "main_q db \"say \", 34, \"hi\", 34, 10, 10, 0"
        );
        assert_eq!(data_line(&entry("main_t", b"\ta")), "main_t db 9, \"a\", 10, 0");
    }

    #[test]
    fn sections_in_order() {
        let source = "class A { int a; m() { prints(\"in a\"); } } main() { prints(\"start\"); }";
        let out = compile(source);

        let data = out.find("segment .data").unwrap();
        let literal = out.find("main_literal_2 db \"start\", 10, 0").unwrap();
        let text = out.find("segment .text").unwrap();
        let global = out.find("global _main").unwrap();
        let print_int = out.find("_print_int:").unwrap();
        let print_string = out.find("_print_string:").unwrap();
        let main = out.find("_main:").unwrap();
        let exit = out.find("    INT 0x80\n\n_A_m:").unwrap();
        let method = out.find("_A_m:").unwrap();

        assert!(data < literal && literal < text && text < global);
        assert!(global < print_int && print_int < print_string && print_string < main);
        assert!(main < exit && exit < method);
        assert!(out.contains("A_m_literal_1 db \"in a\", 10, 0"));
    }

    #[test]
    fn output_names_the_entry_point_for_the_linker() {
        let out = compile("main() { print(0); }");
        assert!(out.contains("global _main\n; no _start symbol, link with ld -m elf_i386 -e _main\n\n_print_int:"));
        assert_eq!(out.matches("_main:").count(), 1);
    }

    #[test]
    fn methods_follow_discovery_order() {
        let source = "class Z { int z; b() { print(1); } a() { print(2); } } class Y { int y; c() { print(3); } } main() { print(0); }";
        let out = compile(source);
        let b = out.find("_Z_b:").unwrap();
        let a = out.find("_Z_a:").unwrap();
        let c = out.find("_Y_c:").unwrap();
        assert!(b < a && a < c);
        assert!(out.ends_with("    RET\n"));
    }

    #[test]
    fn termination_follows_main() {
        let out = compile("main() { print(0); }");
        assert!(out.contains(
            "_main:\n    MOV EBP, ESP\n    MOV EAX, 0\n    PUSH EAX\n    CALL _print_int\n    ADD ESP, 4\n    MOV EAX, 1\n    XOR EBX, EBX\n    INT 0x80\n"
        ));
    }
}
