use cmdlink::input::LogicalButton;
use cmdlink::net::{
    MessageReader, MessageWriter, TransmissionScheduler, read_delta_enhanced, read_delta_legacy,
    write_delta_enhanced, write_delta_legacy,
};
use cmdlink::{
    Action, ButtonBits, CommandSession, MouseDelta, MoveCommand, PressSource, ProtocolVersion,
    ServerState, Settings,
};
use proptest::prelude::*;

const SOURCES: [PressSource; 2] = [PressSource::Key(5), PressSource::Key(9)];

fn command_strategy() -> impl Strategy<Value = MoveCommand> {
    (
        any::<u8>(),
        any::<u8>(),
        any::<[i16; 3]>(),
        any::<i16>(),
        any::<i16>(),
        any::<i16>(),
        any::<u8>(),
    )
        .prop_map(
            |(msec, buttons, angles, forward_move, side_move, up_move, impulse)| MoveCommand {
                msec,
                buttons: ButtonBits::from_bits_retain(buttons),
                angles,
                forward_move,
                side_move,
                up_move,
                impulse,
            },
        )
}

fn near(base: MoveCommand) -> impl Strategy<Value = MoveCommand> {
    (-200i32..200, -200i32..200, any::<bool>(), any::<i16>()).prop_map(
        move |(pitch, yaw, moved, forward)| {
            let mut cmd = base;
            cmd.angles[0] = (cmd.angles[0] as i32 + pitch) as i16;
            cmd.angles[1] = (cmd.angles[1] as i32 + yaw) as i16;
            if moved {
                cmd.forward_move = forward;
            }
            cmd
        },
    )
}

fn movement_actions() -> Vec<Action> {
    vec![
        Action::Forward,
        Action::Back,
        Action::Left,
        Action::Right,
        Action::MoveLeft,
        Action::MoveRight,
        Action::MoveUp,
        Action::MoveDown,
        Action::Strafe,
        Action::Speed,
    ]
}

proptest! {
    #[test]
    fn prop_button_down_iff_a_source_held(
        ops in prop::collection::vec((0usize..2, any::<bool>(), 1u32..50), 1..64)
    ) {
        let mut button = LogicalButton::new();
        let mut held = [false; 2];
        let mut time = 1000u32;

        for (source, press, step) in ops {
            time += step;
            let was_down = held.iter().any(|&h| h);

            let edge = if press {
                held[source] = true;
                button.press(SOURCES[source], Some(time), time)
            } else {
                held[source] = false;
                button.release(SOURCES[source], Some(time))
            };
            let is_down = held.iter().any(|&h| h);

            prop_assert_eq!(button.is_down(), is_down);
            prop_assert_eq!(edge, was_down != is_down);
            prop_assert_eq!(button.was_released(), was_down && !is_down);

            button.clear(time);
        }
    }

    #[test]
    fn prop_active_fraction_bounded(
        down_at in 1u32..10_000,
        held_for in 0u32..10_000,
        released in any::<bool>(),
        cmd_msec in 0u32..1000,
        later in 0u32..10_000,
    ) {
        let mut button = LogicalButton::new();
        button.press(PressSource::Key(1), Some(down_at), down_at);
        if released {
            button.release(PressSource::Key(1), Some(down_at + held_for));
        }

        let fraction = button.active_fraction(cmd_msec, down_at + later);
        prop_assert!((0.0..=1.0).contains(&fraction));
        if cmd_msec == 0 {
            prop_assert_eq!(fraction, 0.0);
        }
    }

    #[test]
    fn prop_legacy_delta_roundtrip(
        from in prop::option::of(command_strategy()),
        cmd in command_strategy(),
    ) {
        let mut msg = MessageWriter::new();
        write_delta_legacy(&mut msg, from.as_ref(), &cmd);
        let data = msg.finish();

        let mut reader = MessageReader::new(&data);
        prop_assert_eq!(read_delta_legacy(&mut reader, from.as_ref()), Ok(cmd));
        prop_assert!(reader.is_empty());
    }

    #[test]
    fn prop_enhanced_delta_roundtrip(
        from in prop::option::of(command_strategy()),
        cmd in command_strategy(),
    ) {
        let mut msg = MessageWriter::new();
        write_delta_enhanced(&mut msg, from.as_ref(), &cmd);
        let data = msg.finish();

        let mut reader = MessageReader::new(&data);
        prop_assert_eq!(read_delta_enhanced(&mut reader, from.as_ref()), Ok(cmd));
    }

    #[test]
    fn prop_enhanced_chain_roundtrip(
        (first, second) in command_strategy().prop_flat_map(|base| (Just(base), near(base)))
    ) {
        let mut msg = MessageWriter::new();
        write_delta_enhanced(&mut msg, None, &first);
        write_delta_enhanced(&mut msg, Some(&first), &second);
        let data = msg.finish();

        let mut reader = MessageReader::new(&data);
        let decoded_first = read_delta_enhanced(&mut reader, None);
        prop_assert_eq!(decoded_first, Ok(first));
        prop_assert_eq!(read_delta_enhanced(&mut reader, Some(&first)), Ok(second));
    }

    #[test]
    fn prop_movement_within_max_speed(
        held in prop::collection::vec(any::<bool>(), 10),
        mouse in prop::collection::vec((-500i32..500, -500i32..500), 1..8),
        max_speed in 1.0f32..1000.0,
        always_run in any::<bool>(),
    ) {
        let mut settings = Settings::default();
        settings.input.always_run = always_run;
        settings.input.sensitivity = 10.0;
        settings.net.max_packets = 0;

        let mut session = CommandSession::new(settings);
        session.connect(ProtocolVersion::Batched);
        session.activate();
        session.set_server_state(ServerState {
            max_speed,
            ..Default::default()
        });

        let mut time = 1000;
        for (key, (action, down)) in movement_actions().into_iter().zip(held).enumerate() {
            if down {
                session.press(action, PressSource::Key(key as u32 + 1), Some(time), time);
            }
        }

        for (dx, dy) in mouse {
            time += 16;
            session.frame(16, time, Some(MouseDelta { dx, dy }));
        }
        prop_assert!(session.finalize(time, false).is_some());

        let cmd = session.commands().latest();
        let [forward, side, up] = cmd.move_vector().map(|v| v as f32);
        let length = (forward * forward + side * side + up * up).sqrt();
        prop_assert!(length <= max_speed + 0.01, "length {} max {}", length, max_speed);
    }

    #[test]
    fn prop_scheduler_respects_min_interval(
        rate in 10u32..250,
        steps in prop::collection::vec(1u32..40, 1..100),
    ) {
        let mut interval = 1000 / rate;
        if interval != 0 {
            interval = 100 / (100 / interval);
        }

        let mut scheduler = TransmissionScheduler::new();
        let mut now = 10_000u32;
        let mut last_sent: Option<u32> = None;

        for step in steps {
            now += step;
            if scheduler.ready_to_send(now, false, rate) {
                if let Some(last) = last_sent {
                    prop_assert!(now - last >= interval);
                }
                scheduler.mark_transmitted(now, 0);
                last_sent = Some(now);
            }

            prop_assert!(scheduler.ready_to_send(now, false, 0));
            prop_assert!(scheduler.ready_to_send(now, true, rate));
        }
    }
}
