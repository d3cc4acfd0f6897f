use afl::fuzz;
use exo_bytecode::{CodeAttribute, CodeBuilder, CodeModel, ConstantPool};

fn main() {
    fuzz!(|data: &[u8]| {
        if data.is_empty() || data.len() > 0xffff {
            return;
        }
        let cp = ConstantPool::new();
        let attribute = CodeAttribute {
            code: data.to_vec(),
            ..Default::default()
        };
        let elements = match CodeModel::new(&attribute, &cp).decode() {
            Ok(elements) => elements,
            Err(_) => return,
        };

        // anything that decodes must encode again and decode to the same elements
        let mut pool = cp.clone();
        let mut builder = CodeBuilder::new(&mut pool);
        for element in elements.iter().cloned() {
            if let Err(e) = builder.with(element) {
                panic!("decoded element failed to encode: {}", e);
            }
        }
        let built = match builder.finish() {
            Ok(built) => built.into_attribute(0, 0),
            Err(e) => panic!("decoded code failed to finish: {}", e),
        };
        assert_eq!(built.code.len(), data.len());
        assert_eq!(CodeModel::new(&built, &pool).decode(), Ok(elements));
    });
}
