//! The sequence pipelines driven through substitute containers.
use std::cell::RefCell;
use std::rc::Rc;

use gif_anim::delay::DelayMode;
use gif_anim::{
    Container, ContainerReader, ContainerWriter, DecodeError, EncodeError, Frame,
    FrameProperties, FrameSequence, Repeat, SequenceDecoder, SequenceEncoder,
};

#[derive(Debug, thiserror::Error)]
#[error("mock container: {0}")]
struct MockError(&'static str);

fn pixel(value: u8) -> Frame {
    Frame::from_rgba(1, 1, vec![value, value, value, 255]).unwrap()
}

#[derive(Clone, Default)]
struct MockReader {
    images: Vec<Option<Frame>>,
    properties: Vec<Option<FrameProperties>>,
    still: Option<Frame>,
    repeat: Repeat,
}

impl ContainerReader for MockReader {
    type Error = MockError;

    fn frame_count(&self) -> usize {
        self.images.len()
    }

    fn image_at(&mut self, index: usize) -> Result<Frame, MockError> {
        self.images[index].clone().ok_or(MockError("broken frame"))
    }

    fn properties_at(&self, index: usize) -> Option<FrameProperties> {
        self.properties.get(index).copied().flatten()
    }

    fn repeat(&self) -> Repeat {
        self.repeat
    }

    fn still_image(&mut self) -> Option<Frame> {
        self.still.clone()
    }
}

#[derive(Debug, Default)]
struct Recorded {
    opened: usize,
    repeat: Option<Repeat>,
    frames: Vec<FrameProperties>,
}

#[derive(Clone, Copy, Default)]
struct Failures {
    open: bool,
    repeat: bool,
    frame: Option<usize>,
    finalize: bool,
}

struct MockWriter {
    log: Rc<RefCell<Recorded>>,
    fail: Failures,
    added: usize,
}

impl ContainerWriter for MockWriter {
    type Error = MockError;

    fn set_repeat(&mut self, repeat: Repeat) -> Result<(), MockError> {
        if self.fail.repeat {
            return Err(MockError("loop metadata refused"));
        }
        self.log.borrow_mut().repeat = Some(repeat);
        Ok(())
    }

    fn add_frame(&mut self, _: &Frame, properties: &FrameProperties) -> Result<(), MockError> {
        let index = self.added;
        self.added += 1;
        if self.fail.frame == Some(index) {
            return Err(MockError("frame refused"));
        }
        self.log.borrow_mut().frames.push(*properties);
        Ok(())
    }

    fn finalize(self) -> Result<Vec<u8>, MockError> {
        if self.fail.finalize {
            return Err(MockError("cannot finalize"));
        }
        Ok(vec![self.log.borrow().frames.len() as u8])
    }
}

#[derive(Default)]
struct MockContainer {
    reader: Option<MockReader>,
    fail: Failures,
    log: Rc<RefCell<Recorded>>,
}

impl Container for MockContainer {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn open_for_read(&self, _: &[u8]) -> Result<MockReader, MockError> {
        self.reader.clone().ok_or(MockError("not a container"))
    }

    fn open_for_write(&self, _: usize) -> Result<MockWriter, MockError> {
        self.log.borrow_mut().opened += 1;
        if self.fail.open {
            return Err(MockError("cannot open"));
        }
        Ok(MockWriter {
            log: Rc::clone(&self.log),
            fail: self.fail,
            added: 0,
        })
    }
}

fn mock_decoder(reader: MockReader) -> SequenceDecoder<MockContainer> {
    SequenceDecoder::with_container(MockContainer {
        reader: Some(reader),
        ..MockContainer::default()
    })
}

#[test]
fn unreadable_bytes() {
    let decoder = SequenceDecoder::with_container(MockContainer::default());
    let err = decoder.decode(b"whatever").unwrap_err();
    assert!(matches!(err, DecodeError::MalformedInput(_)));
    assert_eq!(
        std::error::Error::source(&err).map(|s| s.to_string()),
        Some("mock container: not a container".to_string())
    );
}

#[test]
fn still_image_without_frames() {
    let reader = MockReader {
        still: Some(pixel(7)),
        ..MockReader::default()
    };
    let sequence = mock_decoder(reader).decode(b"").unwrap();
    assert_eq!(sequence.len(), 1);
    assert_eq!(sequence.frames()[0].pixels(), &[7, 7, 7, 255]);
    assert_eq!(sequence.frames()[0].delay(), None);
    assert_eq!(sequence.total_duration(), 0.0);
}

#[test]
fn nothing_decodable() {
    let sequence = mock_decoder(MockReader::default()).decode(b"");
    assert!(matches!(sequence, Err(DecodeError::NoDecodableFrames)));

    let reader = MockReader {
        images: vec![None, None],
        ..MockReader::default()
    };
    let sequence = mock_decoder(reader).decode(b"");
    assert!(matches!(sequence, Err(DecodeError::NoDecodableFrames)));
}

#[test]
fn failed_frames_are_left_out() {
    let reader = MockReader {
        images: vec![Some(pixel(1)), None, Some(pixel(3))],
        properties: vec![
            Some(FrameProperties::with_delay(10)),
            Some(FrameProperties::with_delay(500)),
            Some(FrameProperties::with_delay(30)),
        ],
        repeat: Repeat::Finite(4),
        ..MockReader::default()
    };
    let sequence = mock_decoder(reader).decode(b"").unwrap();
    assert_eq!(sequence.len(), 2);
    assert_eq!(sequence.frames()[1].pixels(), &[3, 3, 3, 255]);
    assert!((sequence.total_duration() - 0.4).abs() < 1e-9);
    assert_eq!(sequence.repeat(), Repeat::Finite(4));
}

#[test]
fn delay_resolution() {
    let unclamped = FrameProperties {
        delay: Some(10),
        unclamped_delay: Some(1),
        ..FrameProperties::default()
    };
    let reader = MockReader {
        images: vec![Some(pixel(1)), Some(pixel(2)), Some(pixel(3)), Some(pixel(4))],
        properties: vec![
            Some(unclamped),
            Some(FrameProperties::with_delay(40)),
            Some(FrameProperties::default()),
            None,
        ],
        ..MockReader::default()
    };
    let sequence = mock_decoder(reader).decode(b"").unwrap();
    let delays: Vec<_> = sequence.iter().map(Frame::delay).collect();
    assert_eq!(delays, [Some(0.01), Some(0.4), Some(0.0), Some(0.0)]);
}

#[test]
fn decoder_options() {
    let reader = MockReader {
        images: vec![Some(pixel(1)), Some(pixel(2))],
        properties: vec![Some(FrameProperties::with_delay(10)); 2],
        ..MockReader::default()
    };
    let mut decoder = mock_decoder(reader);
    decoder.set_scale(3.0);
    decoder.set_duration(4.0);
    let sequence = decoder.decode(b"").unwrap();
    assert_eq!(sequence.scale(), 3.0);
    assert_eq!(sequence.total_duration(), 4.0);
    assert!((sequence.calculated_duration() - 0.2).abs() < 1e-9);
}

fn mock_encoder(fail: Failures) -> (SequenceEncoder<MockContainer>, Rc<RefCell<Recorded>>) {
    let log = Rc::new(RefCell::new(Recorded::default()));
    let container = MockContainer {
        reader: None,
        fail,
        log: Rc::clone(&log),
    };
    (SequenceEncoder::with_container(container), log)
}

fn three_pixels() -> FrameSequence {
    FrameSequence::new(vec![pixel(1), pixel(2), pixel(3)])
}

#[test]
fn empty_input_opens_nothing() {
    let (encoder, log) = mock_encoder(Failures::default());
    let result = encoder.encode(&FrameSequence::new(Vec::new()));
    assert!(matches!(result, Err(EncodeError::EmptyInput)));
    assert_eq!(log.borrow().opened, 0);
}

#[test]
fn uniform_delay_and_loop_count() {
    let (mut encoder, log) = mock_encoder(Failures::default());
    encoder.set_duration(1.5);
    encoder.set_loop_count(0);
    assert_eq!(encoder.encode(&three_pixels()).unwrap(), [3]);

    let log = log.borrow();
    assert_eq!(log.opened, 1);
    assert_eq!(log.repeat, Some(Repeat::Infinite));
    let delays: Vec<_> = log.frames.iter().map(|p| p.delay).collect();
    assert_eq!(delays, [Some(50); 3]);
}

#[test]
fn per_frame_mode_falls_back_to_uniform() {
    let (mut encoder, log) = mock_encoder(Failures::default());
    encoder.set_delay_mode(DelayMode::PerFrame);
    let sequence = FrameSequence::new(vec![pixel(1).with_delay(0.7), pixel(2)]).with_duration(2.0);
    encoder.encode(&sequence).unwrap();
    let delays: Vec<_> = log.borrow().frames.iter().map(|p| p.delay).collect();
    assert_eq!(delays, [Some(70), Some(100)]);
}

#[test]
fn refused_frame_is_skipped() {
    let (encoder, log) = mock_encoder(Failures {
        frame: Some(1),
        ..Failures::default()
    });
    assert_eq!(encoder.encode(&three_pixels()).unwrap(), [2]);
    assert_eq!(log.borrow().frames.len(), 2);
}

#[test]
fn writer_failures() {
    let (encoder, _) = mock_encoder(Failures {
        open: true,
        ..Failures::default()
    });
    assert!(matches!(
        encoder.encode(&three_pixels()),
        Err(EncodeError::ContainerInitFailed(_))
    ));

    let (encoder, _) = mock_encoder(Failures {
        repeat: true,
        ..Failures::default()
    });
    assert!(matches!(
        encoder.encode(&three_pixels()),
        Err(EncodeError::ContainerInitFailed(_))
    ));

    let (encoder, log) = mock_encoder(Failures {
        finalize: true,
        ..Failures::default()
    });
    assert!(matches!(
        encoder.encode(&three_pixels()),
        Err(EncodeError::FinalizeFailed(_))
    ));
    assert_eq!(log.borrow().frames.len(), 3);
}
