use exo_bytecode::{
    code::CodeAttribute,
    constant_pool::{ConstantResolver, ConstantValue},
    error::MalformedCode,
    instruction::*,
    CodeBuilder, CodeElement, CodeError, CodeModel, ConstantPool, Kind, Label, Opcode, TypeKind,
};
use pretty_assertions::assert_eq;

/// Pool indexes every sample instruction draws on.
struct Fixture {
    cp: ConstantPool,
    class: u16,
    array_class: u16,
    field: u16,
    method: u16,
    interface_method: u16,
    call_site: u16,
    string: u16,
    integer: u16,
    long: u16,
}

impl Fixture {
    fn new() -> Self {
        let mut cp = ConstantPool::new();
        Self {
            class: cp.add_class("java/lang/StringBuilder").unwrap(),
            array_class: cp.add_class("[[J").unwrap(),
            field: cp.add_field_ref("java/lang/System", "out", "Ljava/io/PrintStream;").unwrap(),
            method: cp.add_method_ref("java/lang/Math", "max", "(II)I").unwrap(),
            interface_method: cp
                .add_interface_method_ref("java/util/Map", "put", "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;")
                .unwrap(),
            call_site: cp.add_invoke_dynamic(0, "apply", "()Ljava/util/function/Function;").unwrap(),
            string: cp.add_string("hello").unwrap(),
            integer: cp.add_integer(123_456).unwrap(),
            long: cp.add_long(1 << 40).unwrap(),
            cp,
        }
    }

    /// One valid instruction for `op`, branching to `target` where it branches at all.
    fn sample(&self, op: Opcode, target: Label) -> Instruction {
        let cp = &self.cp;
        let slot = |wide: bool| if wide { 300 } else { 5 };
        match op.kind() {
            Kind::Load => LoadInstruction::of(op, op.implicit_slot().unwrap_or(slot(op.is_wide())))
                .unwrap()
                .into(),
            Kind::Store => StoreInstruction::of(op, op.implicit_slot().unwrap_or(slot(op.is_wide())))
                .unwrap()
                .into(),
            Kind::Increment => {
                let constant = if op.is_wide() { 1000 } else { -3 };
                IncrementInstruction::of(op, slot(op.is_wide()), constant).unwrap().into()
            }
            Kind::Branch => BranchInstruction::of(op, target).unwrap().into(),
            Kind::LookupSwitch => {
                LookupSwitchInstruction::of(target, vec![SwitchCase::of(-7, target), SwitchCase::of(9, target)])
                    .unwrap()
                    .into()
            }
            Kind::TableSwitch => TableSwitchInstruction::of(-1, 1, target, vec![SwitchCase::of(0, target)])
                .unwrap()
                .into(),
            Kind::Return => ReturnInstruction::of(op).unwrap().into(),
            Kind::ThrowException => ThrowInstruction::of(op).unwrap().into(),
            Kind::FieldAccess => FieldInstruction::of(op, cp.member_ref(self.field).unwrap()).unwrap().into(),
            Kind::Invoke => {
                let index = if op == Opcode::Invokeinterface {
                    self.interface_method
                } else {
                    self.method
                };
                InvokeInstruction::of(op, cp.member_ref(index).unwrap()).unwrap().into()
            }
            Kind::InvokeDynamic => InvokeDynamicInstruction::of(cp.invoke_dynamic(self.call_site).unwrap())
                .unwrap()
                .into(),
            Kind::NewObject => NewObjectInstruction::of(cp.class_entry(self.class).unwrap()).unwrap().into(),
            Kind::NewPrimitiveArray => NewPrimitiveArrayInstruction::of(TypeKind::Boolean).unwrap().into(),
            Kind::NewReferenceArray => NewReferenceArrayInstruction::of(cp.class_entry(self.class).unwrap())
                .unwrap()
                .into(),
            Kind::NewMultiArray => NewMultiArrayInstruction::of(cp.class_entry(self.array_class).unwrap(), 2)
                .unwrap()
                .into(),
            Kind::TypeCheck => TypeCheckInstruction::of(op, cp.class_entry(self.class).unwrap()).unwrap().into(),
            Kind::ArrayLoad => ArrayLoadInstruction::of(op).unwrap().into(),
            Kind::ArrayStore => ArrayStoreInstruction::of(op).unwrap().into(),
            Kind::Stack => StackInstruction::of(op).unwrap().into(),
            Kind::Convert => ConvertInstruction::of(op).unwrap().into(),
            Kind::Operator => OperatorInstruction::of(op).unwrap().into(),
            Kind::Constant => match op {
                Opcode::Bipush => ConstantInstruction::of_argument(op, -100),
                Opcode::Sipush => ConstantInstruction::of_argument(op, 30_000),
                Opcode::Ldc => ConstantInstruction::of_load(op, cp.loadable_constant(self.string).unwrap()),
                Opcode::LdcW => ConstantInstruction::of_load(op, cp.loadable_constant(self.integer).unwrap()),
                Opcode::Ldc2W => ConstantInstruction::of_load(op, cp.loadable_constant(self.long).unwrap()),
                _ => ConstantInstruction::of_intrinsic(op),
            }
            .unwrap()
            .into(),
            Kind::Monitor => MonitorInstruction::of(op).unwrap().into(),
            Kind::Nop => NopInstruction::of(op).unwrap().into(),
            Kind::DiscontinuedJsr => DiscontinuedJsrInstruction::of(op, target).unwrap().into(),
            Kind::DiscontinuedRet => DiscontinuedRetInstruction::of(op, slot(op.is_wide())).unwrap().into(),
        }
    }
}

fn decode(code: Vec<u8>, cp: &ConstantPool) -> Result<Vec<CodeElement>, CodeError> {
    let attribute = CodeAttribute {
        code,
        ..Default::default()
    };
    CodeModel::new(&attribute, cp).decode()
}

#[test]
fn every_opcode_survives_a_round_trip() {
    let fixture = Fixture::new();
    for op in Opcode::ALL.iter().copied() {
        let mut pool = fixture.cp.clone();
        let mut b = CodeBuilder::new(&mut pool);
        let target = b.new_label();
        let instruction = fixture.sample(op, target);
        assert_eq!(instruction.opcode(), op);
        b.label(target).unwrap();
        b.instruction(instruction.clone()).unwrap();
        b.return_(TypeKind::Void).unwrap();
        let code = b.finish().unwrap().code;
        assert_eq!(code.len(), instruction.size_in_bytes(0) + 1, "{}", op);

        let elements = decode(code.clone(), &fixture.cp).unwrap();
        let decoded_target = elements.iter().find_map(|e| match e {
            CodeElement::Label(l) => Some(*l),
            _ => None,
        });
        let decoded = elements.iter().find_map(CodeElement::as_instruction).unwrap();
        let expected = match decoded_target {
            Some(l) => fixture.sample(op, l),
            None => instruction,
        };
        assert_eq!(decoded, &expected, "{}", op);
    }
}

#[test]
fn byte_array_store_normalizes_to_byte() {
    let fixture = Fixture::new();
    let elements = decode(vec![0x54, 0xb1], &fixture.cp).unwrap();
    match elements[0].as_instruction() {
        Some(Instruction::ArrayStore(store)) => assert_eq!(store.type_kind(), TypeKind::Byte),
        other => panic!("expected an array store, got {:?}", other),
    }

    let store = ArrayStoreInstruction::of(Opcode::Bastore).unwrap();
    assert_eq!(store.type_kind(), TypeKind::Byte);
    assert_eq!(
        ArrayStoreInstruction::of_kind(TypeKind::Boolean).unwrap().type_kind(),
        TypeKind::Byte
    );
    assert_eq!(
        ArrayStoreInstruction::of(Opcode::Baload),
        Err(CodeError::KindMismatch {
            opcode: Opcode::Baload,
            expected: Kind::ArrayStore
        })
    );
}

#[test]
fn branch_label_terminal_round_trip() {
    let cp = ConstantPool::new();
    let code = vec![0xa7, 0x00, 0x03, 0xb1];
    let elements = decode(code.clone(), &cp).unwrap();
    assert_eq!(elements.len(), 3);
    let target = match &elements[1] {
        CodeElement::Label(l) => *l,
        other => panic!("expected a label, got {:?}", other),
    };
    assert_eq!(target.decoded_bci(), Some(3));
    assert_eq!(
        elements[0],
        CodeElement::Instruction(BranchInstruction::of(Opcode::Goto, target).unwrap().into())
    );

    let mut pool = cp.clone();
    let mut b = CodeBuilder::new(&mut pool);
    for element in elements {
        b.with(element).unwrap();
    }
    assert_eq!(b.finish().unwrap().code, code);
}

#[test]
fn undefined_opcode_offset() {
    let cp = ConstantPool::new();
    for p in [0usize, 1, 4] {
        let mut code = vec![0x00; 6];
        code[p] = 0xfe;
        assert_eq!(
            decode(code, &cp),
            Err(CodeError::Malformed {
                offset: p,
                kind: MalformedCode::UnknownOpcode(0xfe)
            })
        );
    }
}

#[test]
fn builder_label_placement() {
    let mut cp = ConstantPool::new();

    let mut b = CodeBuilder::new(&mut cp);
    let skip = b.new_label();
    b.constant(ConstantValue::Integer(0)).unwrap();
    b.branch(Opcode::Ifeq, skip).unwrap();
    b.constant(ConstantValue::Integer(1)).unwrap();
    b.instruction(StackInstruction::of(Opcode::Pop).unwrap()).unwrap();
    b.label(skip).unwrap();
    b.return_(TypeKind::Void).unwrap();
    let code = b.finish().unwrap().code;
    // ifeq at 1 jumps over iconst_1 and pop to the return at 6
    assert_eq!(code, vec![0x03, 0x99, 0x00, 0x05, 0x04, 0x57, 0xb1]);

    let mut b = CodeBuilder::new(&mut cp);
    let never = b.new_label();
    b.goto_(never).unwrap();
    assert_eq!(b.finish(), Err(CodeError::UnresolvedLabel(never)));

    let mut b = CodeBuilder::new(&mut cp);
    let twice = b.new_label();
    b.label(twice).unwrap().return_(TypeKind::Void).unwrap();
    assert!(matches!(b.label(twice), Err(CodeError::LabelAlreadyPlaced(l)) if l == twice));
}

#[test]
fn decoded_method_rebuilds_identically() {
    let fixture = Fixture::new();
    let mut pool = fixture.cp.clone();
    let mut b = CodeBuilder::new(&mut pool);
    let (top, done, one, two) = (b.new_label(), b.new_label(), b.new_label(), b.new_label());
    b.line_number(1).unwrap();
    b.constant(ConstantValue::Integer(0)).unwrap();
    b.store(TypeKind::Int, 1).unwrap();
    b.label(top).unwrap().line_number(2).unwrap();
    b.load(TypeKind::Int, 1).unwrap();
    b.table_switch(1, 2, done, vec![SwitchCase::of(1, one), SwitchCase::of(2, two)]).unwrap();
    b.label(one).unwrap().iinc(1, 1).unwrap().goto_(top).unwrap();
    b.label(two).unwrap().iinc(1, 500).unwrap().goto_(top).unwrap();
    b.label(done).unwrap();
    b.local_variable(1, "i", "I", top, done).unwrap();
    b.instruction(FieldInstruction::of(Opcode::Getstatic, pool_member(&fixture)).unwrap()).unwrap();
    b.constant(ConstantValue::String("hello".to_owned())).unwrap();
    b.return_(TypeKind::Void).unwrap();
    let built = b.finish().unwrap();
    let attribute = built.clone().into_attribute(2, 2);

    let elements = CodeModel::new(&attribute, &pool).decode().unwrap();
    let mut rebuilt_pool = pool.clone();
    let mut rebuilder = CodeBuilder::new(&mut rebuilt_pool);
    for element in elements {
        rebuilder.with(element).unwrap();
    }
    let rebuilt = rebuilder.finish().unwrap();
    assert_eq!(rebuilt.code, built.code);
    assert_eq!(rebuilt.line_numbers, built.line_numbers);
    assert_eq!(rebuilt.local_variables, built.local_variables);
    assert_eq!(rebuilt_pool.len(), pool.len());
}

fn pool_member(fixture: &Fixture) -> exo_bytecode::constant_pool::MemberRef {
    fixture.cp.member_ref(fixture.field).unwrap()
}
