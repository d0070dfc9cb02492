use crate::{InputUnit, Timestamp};

const PREVIEW: usize = 16;

/// Per buffer trace logging, with a hex preview of the payload.
#[derive(Debug)]
pub struct BufferLogger {
	name: &'static str,
	inputs: u64,
	outputs: u64,
}

impl BufferLogger {
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			inputs: 0,
			outputs: 0,
		}
	}

	pub fn log_input(&mut self, unit: &InputUnit) {
		self.inputs += 1;

		if !tracing::enabled!(tracing::Level::TRACE) {
			return;
		}

		if unit.end_of_stream {
			tracing::trace!(kind = self.name, index = self.inputs, "input: end of stream");
			return;
		}

		tracing::trace!(
			kind = self.name,
			index = self.inputs,
			timestamp = %unit.timestamp(),
			size = unit.payload.len(),
			data = %preview(&unit.payload),
			"input"
		);
	}

	pub fn log_output(&mut self, timestamp: Timestamp, data: &[u8]) {
		self.outputs += 1;

		tracing::trace!(
			kind = self.name,
			index = self.outputs,
			%timestamp,
			size = data.len(),
			data = %preview(data),
			"output"
		);
	}

	pub fn inputs(&self) -> u64 {
		self.inputs
	}

	pub fn outputs(&self) -> u64 {
		self.outputs
	}
}

fn preview(data: &[u8]) -> String {
	let mut out = hex::encode(&data[..data.len().min(PREVIEW)]);
	if data.len() > PREVIEW {
		out.push_str("..");
	}
	out
}
