use itccompiler_backend::*;

fn spec() -> StimulusSpec {
    StimulusSpec {
        amplitude: 5.0,
        full_range_v: 10.0,
        duration_ms: 100.,
        pulse_width_us: 100.,
        frequency_hz: 200.,
        ..Default::default()
    }
}

fn compile(channels: &[StimulusSpec]) -> CompileResult<CompiledProgram> {
    compile_pulse_train(channels, ITC18_DEBUG_FIFO_SIZE, &HardwareLimits::default())
}

#[test]
fn gate_only_train() {
    // 100 ms train, 25 ms porches, gate on bit 0, no pulses
    let gate_only = StimulusSpec { frequency_hz: 0., ..spec() };
    let program = compile(&[gate_only]).unwrap();
    let (porch, train) = (program.porch_sets(), program.train_sets());
    assert_eq!((porch, train), (2000, 8000));
    assert_eq!(program.sample_sets(), 2 * porch + train);

    assert!(program.samples().column(0).iter().all(|&v| v == 0));
    let digital = program.digital_words();
    assert!(digital[..porch].iter().all(|&d| d == 0b1));
    assert!(digital[porch..porch + train].iter().all(|&d| d == 0b1));
    assert!(digital[porch + train..digital.len() - 1].iter().all(|&d| d == 0b1));
    assert_eq!(digital[digital.len() - 1], 0);
}

#[test]
fn pulse_amplitude_in_voltage_mode() {
    let program = compile(&[spec()]).unwrap();
    let start = program.porch_sets();
    assert_eq!(program.pulse_sets(), 8);
    for set in start..start + 8 {
        assert_eq!(program.sample_set(set).to_vec(), vec![16, 0b11]);
    }
    assert_eq!(program.sample_set(start + 8).to_vec(), vec![0, 0b01]);
    // 200 Hz at 12.5 us per set: next pulse 400 sets later
    assert_eq!(program.sample_set(start + 400).to_vec(), vec![16, 0b11]);
}

#[test]
fn ungated_program_has_no_porch() {
    let ungated = StimulusSpec { do_gate: false, ..spec() };
    let program = compile(&[ungated]).unwrap();
    assert_eq!(program.porch_sets(), 0);
    assert_eq!(program.sample_sets(), program.train_sets());
    // Markers only, no gate bit
    assert_eq!(program.digital_word(0), 0b10);
    assert_eq!(program.digital_word(8), 0);
}

#[test]
fn last_digital_word_is_always_zero() {
    let variants = [
        spec(),
        StimulusSpec { frequency_hz: 0., ..spec() },
        StimulusSpec { do_gate: false, ..spec() },
        StimulusSpec { duration_ms: 0., ..spec() },
        StimulusSpec { gate_porch_ms: 0., ..spec() },
        StimulusSpec { frequency_hz: 10_000., pulse_width_us: 50., duration_ms: 1., ..spec() },
    ];
    for variant in variants {
        let program = compile(&[variant.clone()]).unwrap();
        assert_eq!(program.digital_word(program.sample_sets() - 1), 0, "{variant:?}");
        assert_eq!(
            program.sample_sets(),
            2 * program.porch_sets() + program.train_sets().max(1),
            "{variant:?}"
        );
    }
}

#[test]
fn compilation_is_deterministic() {
    let channels = [
        StimulusSpec { pulse_biphasic: true, ..spec() },
        StimulusSpec { da_channel: 3, amplitude: -1., ..spec() },
    ];
    let first = compile(&channels).unwrap();
    let second = compile(&channels).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.interleaved(), second.interleaved());
}

#[test]
fn multichannel_layout() {
    let channels = [
        StimulusSpec { da_channel: 2, ..spec() },
        StimulusSpec { da_channel: 0, amplitude: -5., ..spec() },
    ];
    let program = compile(&channels).unwrap();
    assert_eq!(program.stride(), 3);
    assert_eq!(program.instruction_words(), vec![0x5000, 0x4000, 0x6C00]);
    let first_pulse = program.porch_sets();
    assert_eq!(program.sample_set(first_pulse).to_vec(), vec![16, -16, 0b11]);
    assert_eq!(program.n_samples(), program.sample_sets() * 3);
}

#[test]
fn fifo_pressure_slows_the_clock() {
    // 150 ms of stimulus in a 64k FIFO on one channel: budget of 16384 instructions
    let program = compile_pulse_train(&[spec()], 1 << 16, &HardwareLimits::default()).unwrap();
    assert_eq!(program.ticks_per_instruction(), 8);
    assert!(program.n_samples() <= (1 << 16) / 2);
}

#[test]
fn unsatisfiable_timing() {
    // 100 s does not fit a 1024-sample FIFO even at the slowest clock
    let long = StimulusSpec { duration_ms: 100_000., ..spec() };
    let err = compile_pulse_train(&[long], 1024, &HardwareLimits::default()).unwrap_err();
    assert!(matches!(err, CompileError::TimingUnsatisfiable { stride: 2, fifo_size: 1024, .. }));
}

#[test]
fn invalid_specs() {
    assert!(compile(&[]).is_err());
    assert!(compile(&[StimulusSpec { amplitude: 20_000., ..spec() }]).is_err());
    assert!(compile(&[StimulusSpec { da_channel: parse_da_channel("da1").unwrap(), pulse_width_us: -1., ..spec() }]).is_err());
    assert!(parse_da_channel("ao0").is_err());
}
